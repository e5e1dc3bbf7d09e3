use crate::config::PaginationConfig;
use crate::pagination::{NextPage, PageObservation, PageOutcome, PaginationState, StopReason};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Pagination state machine for one category
#[derive(Debug)]
pub struct PaginationController {
    category_url: Url,
    config: PaginationConfig,
    page_limit: u32,
    /// Listing pages (or triggers) handed out so far
    issued: u32,
    /// Page counter for query-parameter and path-segment kinds
    counter: u32,
    next_url: Option<Url>,
    /// Container count of the previous script iteration
    last_matches: usize,
    visited: HashSet<Url>,
    stop: Option<StopReason>,
}

impl PaginationController {
    /// Creates a controller
    ///
    /// # Arguments
    ///
    /// * `category_url` - Absolute URL of the first listing page
    /// * `config` - Effective pagination of the category
    /// * `max_pages` - Page limit; zero or negative means one page only
    pub fn new(category_url: Url, config: PaginationConfig, max_pages: i64) -> Self {
        let page_limit = max_pages.clamp(1, u32::MAX as i64) as u32;
        let counter = match &config {
            PaginationConfig::QueryParameter { start, .. }
            | PaginationConfig::PathSegment { start, .. } => *start,
            _ => 0,
        };

        Self {
            category_url,
            config,
            page_limit,
            issued: 0,
            counter,
            next_url: None,
            last_matches: 0,
            visited: HashSet::new(),
            stop: None,
        }
    }

    pub fn state(&self) -> PaginationState {
        match self.stop {
            Some(StopReason::FetchFailed) | Some(StopReason::PolicyDenied) => PaginationState::Error,
            Some(_) => PaginationState::Exhausted,
            None if self.issued == 0 => PaginationState::Start,
            None => PaginationState::HasNext,
        }
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    /// Number of pages handed out so far
    pub fn pages_issued(&self) -> u32 {
        self.issued
    }

    /// Stops the controller from outside, e.g. when the article limit is hit
    pub fn finish(&mut self, reason: StopReason) {
        if self.stop.is_none() {
            self.stop = Some(reason);
        }
    }

    /// Returns the next page target, or `Done` once a stop condition holds
    pub fn next_page(&mut self) -> NextPage {
        if let Some(reason) = self.stop {
            return NextPage::Done(reason);
        }
        if self.issued >= self.page_limit {
            return self.done(StopReason::PageLimit);
        }

        let next = match &self.config {
            PaginationConfig::QueryParameter { param, .. } => Ok(NextPage::Fetch(
                with_query_param(&self.category_url, param, self.counter),
            )),
            PaginationConfig::PathSegment {
                template,
                first_page,
                ..
            } => {
                let suffix = match first_page {
                    Some(first) if self.issued == 0 => first.clone(),
                    _ => template.replace("{page}", &self.counter.to_string()),
                };
                Ok(NextPage::Fetch(join_suffix(&self.category_url, &suffix)))
            }
            PaginationConfig::NextButton { .. } => {
                if self.issued == 0 {
                    Ok(NextPage::Fetch(self.category_url.clone()))
                } else {
                    self.next_url
                        .take()
                        .map(NextPage::Fetch)
                        .ok_or(StopReason::NoNextLink)
                }
            }
            PaginationConfig::ScriptTriggeredLoad {
                trigger,
                max_iterations,
            } => {
                if self.issued == 0 {
                    Ok(NextPage::Open(self.category_url.clone()))
                } else if self.issued > *max_iterations {
                    Err(StopReason::MaxIterations)
                } else {
                    Ok(NextPage::Trigger {
                        selector: trigger.clone(),
                        iteration: self.issued,
                    })
                }
            }
        };

        let next = match next {
            Ok(next) => next,
            Err(reason) => return self.done(reason),
        };

        if let NextPage::Fetch(url) | NextPage::Open(url) = &next {
            if !self.visited.insert(url.clone()) {
                return self.done(StopReason::RepeatedUrl);
            }
        }

        self.issued += 1;
        next
    }

    /// Records what happened to the last target
    pub fn record(&mut self, outcome: PageOutcome) {
        if self.stop.is_some() {
            return;
        }

        match outcome {
            PageOutcome::Observed(observation) => self.observe(observation),
            PageOutcome::FetchFailed | PageOutcome::Denied if self.config.can_skip_pages() => {
                debug!("Skipping page {} of {}", self.counter, self.category_url);
                self.counter = self.counter.saturating_add(1);
            }
            PageOutcome::FetchFailed => self.finish(StopReason::FetchFailed),
            PageOutcome::Denied => self.finish(StopReason::PolicyDenied),
            PageOutcome::TriggerMissing => self.finish(StopReason::NoNextLink),
        }
    }

    fn observe(&mut self, observation: PageObservation) {
        match &self.config {
            PaginationConfig::QueryParameter { .. } | PaginationConfig::PathSegment { .. } => {
                if observation.container_matches == 0 {
                    self.finish(StopReason::EmptyPage);
                } else {
                    self.counter = self.counter.saturating_add(1);
                }
            }
            PaginationConfig::NextButton { .. } => match observation.next_link {
                Some(url) => self.next_url = Some(url),
                None => self.finish(StopReason::NoNextLink),
            },
            PaginationConfig::ScriptTriggeredLoad { .. } => {
                // The first observation is the initial document
                if self.issued > 1 && observation.container_matches <= self.last_matches {
                    self.finish(StopReason::NoNewContent);
                }
                self.last_matches = observation.container_matches;
            }
        }
    }

    fn done(&mut self, reason: StopReason) -> NextPage {
        self.finish(reason);
        NextPage::Done(reason)
    }
}

/// Sets `param=page` on `base`, replacing any existing value
fn with_query_param(base: &Url, param: &str, page: u32) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(param, &page.to_string());
    url
}

/// Appends a path suffix to the category URL
fn join_suffix(base: &Url, suffix: &str) -> Url {
    let mut dir = base.clone();
    if !dir.path().ends_with('/') {
        let path = format!("{}/", dir.path());
        dir.set_path(&path);
    }
    dir.join(suffix.trim_start_matches('/'))
        .unwrap_or_else(|_| base.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn observed(matches: usize) -> PageOutcome {
        PageOutcome::Observed(PageObservation {
            container_matches: matches,
            next_link: None,
        })
    }

    fn fetch_url(next: NextPage) -> String {
        match next {
            NextPage::Fetch(u) => u.to_string(),
            other => panic!("expected fetch, got {:?}", other),
        }
    }

    fn query(start: u32) -> PaginationConfig {
        PaginationConfig::QueryParameter {
            param: "page".to_string(),
            start,
        }
    }

    #[test]
    fn test_query_parameter_counts_up_until_empty_page() {
        let mut ctl = PaginationController::new(url("https://ex.com/news"), query(1), 10);
        assert_eq!(ctl.state(), PaginationState::Start);

        for expected in 1..=3 {
            assert_eq!(
                fetch_url(ctl.next_page()),
                format!("https://ex.com/news?page={}", expected)
            );
            ctl.record(observed(5));
            assert_eq!(ctl.state(), PaginationState::HasNext);
        }

        assert_eq!(fetch_url(ctl.next_page()), "https://ex.com/news?page=4");
        ctl.record(observed(0));
        assert_eq!(ctl.state(), PaginationState::Exhausted);
        assert_eq!(ctl.next_page(), NextPage::Done(StopReason::EmptyPage));
    }

    #[test]
    fn test_query_parameter_replaces_existing_value() {
        let mut ctl =
            PaginationController::new(url("https://ex.com/list?cat=eco&page=9"), query(0), 2);
        assert_eq!(
            fetch_url(ctl.next_page()),
            "https://ex.com/list?cat=eco&page=0"
        );
    }

    #[test]
    fn test_page_limit_zero_means_one_page() {
        for limit in [0, -3, 1] {
            let mut ctl = PaginationController::new(url("https://ex.com/news"), query(1), limit);
            assert!(matches!(ctl.next_page(), NextPage::Fetch(_)));
            ctl.record(observed(5));
            assert_eq!(ctl.next_page(), NextPage::Done(StopReason::PageLimit));
        }
    }

    #[test]
    fn test_path_segment_template_and_first_page() {
        let config = PaginationConfig::PathSegment {
            template: "page/{page}/".to_string(),
            start: 1,
            first_page: Some(String::new()),
        };
        let mut ctl = PaginationController::new(url("https://ex.com/sport"), config, 3);

        assert_eq!(fetch_url(ctl.next_page()), "https://ex.com/sport/");
        ctl.record(observed(3));
        assert_eq!(fetch_url(ctl.next_page()), "https://ex.com/sport/page/2/");
        ctl.record(observed(3));
        assert_eq!(fetch_url(ctl.next_page()), "https://ex.com/sport/page/3/");
    }

    #[test]
    fn test_path_segment_without_first_page_uses_start() {
        let config = PaginationConfig::PathSegment {
            template: "/p/{page}".to_string(),
            start: 1,
            first_page: None,
        };
        let mut ctl = PaginationController::new(url("https://ex.com/sport/"), config, 3);
        assert_eq!(fetch_url(ctl.next_page()), "https://ex.com/sport/p/1");
    }

    #[test]
    fn test_counter_kinds_skip_failed_pages() {
        let mut ctl = PaginationController::new(url("https://ex.com/news"), query(1), 5);
        ctl.next_page();
        ctl.record(PageOutcome::FetchFailed);
        assert_eq!(ctl.state(), PaginationState::HasNext);
        assert_eq!(fetch_url(ctl.next_page()), "https://ex.com/news?page=2");
    }

    #[test]
    fn test_next_button_follows_links_until_absent() {
        let config = PaginationConfig::NextButton {
            selector: "a.next".to_string(),
            attr: "href".to_string(),
        };
        let mut ctl = PaginationController::new(url("https://ex.com/news"), config, 10);

        assert_eq!(fetch_url(ctl.next_page()), "https://ex.com/news");
        ctl.record(PageOutcome::Observed(PageObservation {
            container_matches: 4,
            next_link: Some(url("https://ex.com/news/older")),
        }));
        assert_eq!(fetch_url(ctl.next_page()), "https://ex.com/news/older");
        ctl.record(observed(4));
        assert_eq!(ctl.next_page(), NextPage::Done(StopReason::NoNextLink));
    }

    #[test]
    fn test_next_button_loop_detected() {
        let config = PaginationConfig::NextButton {
            selector: "a.next".to_string(),
            attr: "href".to_string(),
        };
        let mut ctl = PaginationController::new(url("https://ex.com/news"), config, 10);
        ctl.next_page();
        ctl.record(PageOutcome::Observed(PageObservation {
            container_matches: 4,
            next_link: Some(url("https://ex.com/news")),
        }));
        assert_eq!(ctl.next_page(), NextPage::Done(StopReason::RepeatedUrl));
    }

    #[test]
    fn test_next_button_fetch_failure_is_error() {
        let config = PaginationConfig::NextButton {
            selector: "a.next".to_string(),
            attr: "href".to_string(),
        };
        let mut ctl = PaginationController::new(url("https://ex.com/news"), config, 10);
        ctl.next_page();
        ctl.record(PageOutcome::FetchFailed);
        assert_eq!(ctl.state(), PaginationState::Error);
        assert_eq!(ctl.next_page(), NextPage::Done(StopReason::FetchFailed));
    }

    #[test]
    fn test_script_stops_without_new_content() {
        let config = PaginationConfig::ScriptTriggeredLoad {
            trigger: "button.more".to_string(),
            max_iterations: 10,
        };
        let mut ctl = PaginationController::new(url("https://ex.com/live"), config, 20);

        assert_eq!(ctl.next_page(), NextPage::Open(url("https://ex.com/live")));
        ctl.record(observed(10));
        assert_eq!(
            ctl.next_page(),
            NextPage::Trigger {
                selector: "button.more".to_string(),
                iteration: 1
            }
        );
        ctl.record(observed(20));
        assert!(matches!(ctl.next_page(), NextPage::Trigger { iteration: 2, .. }));
        ctl.record(observed(20));
        assert_eq!(ctl.next_page(), NextPage::Done(StopReason::NoNewContent));
    }

    #[test]
    fn test_script_max_iterations() {
        let config = PaginationConfig::ScriptTriggeredLoad {
            trigger: "button.more".to_string(),
            max_iterations: 2,
        };
        let mut ctl = PaginationController::new(url("https://ex.com/live"), config, 20);
        let mut matches = 5;
        ctl.next_page();
        ctl.record(observed(matches));
        for _ in 0..2 {
            matches += 5;
            assert!(matches!(ctl.next_page(), NextPage::Trigger { .. }));
            ctl.record(observed(matches));
        }
        assert_eq!(ctl.next_page(), NextPage::Done(StopReason::MaxIterations));
    }

    #[test]
    fn test_finish_from_outside() {
        let mut ctl = PaginationController::new(url("https://ex.com/news"), query(1), 10);
        ctl.next_page();
        ctl.finish(StopReason::LimitReached);
        assert_eq!(ctl.state(), PaginationState::Exhausted);
        assert_eq!(ctl.next_page(), NextPage::Done(StopReason::LimitReached));
    }
}
