use super::stream_cfg_types::*;
use crate::config::EnvVar;
use crate::err::FatalErr;
use crate::stream::Algorithm;

use std::fmt;
use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    pub max_requests_per_second: MaxRequestsPerSecond,
    pub request_timeout: RequestTimeout,
    pub queue_timeout: QueueTimeout,
    pub stall_timeout: StallTimeout,
    pub linear_start: LinearBackoffStart,
    pub linear_max: LinearBackoffMax,
    pub exponential_start: ExponentialBackoffStart,
    pub exponential_max: ExponentialBackoffMax,
    pub backoff_reset: BackoffReset,
    pub max_saved_tweet_ids: MaxSavedTweetIds,
    pub max_users: MaxUsers,
    pub max_initial_users: MaxInitialUsers,
    pub max_users_per_request: MaxUsersPerRequest,
    pub add_user_timeout: AddUserTimeout,
    pub site_stream_host: SiteStreamHost,
    pub bearer_token: BearerToken,
}

impl Config {
    pub fn from_env(env: EnvVar) -> Result<Self, FatalErr> {
        let cfg = Self {
            max_requests_per_second: MaxRequestsPerSecond::default()
                .maybe_update(env.get("MAX_REQUESTS_PER_SECOND"))?,
            request_timeout: RequestTimeout::default().maybe_update(env.get("REQUEST_TIMEOUT"))?,
            queue_timeout: QueueTimeout::default().maybe_update(env.get("QUEUE_TIMEOUT"))?,
            stall_timeout: StallTimeout::default().maybe_update(env.get("STALL_TIMEOUT"))?,
            linear_start: LinearBackoffStart::default()
                .maybe_update(env.get("LINEAR_BACKOFF_START"))?,
            linear_max: LinearBackoffMax::default().maybe_update(env.get("LINEAR_BACKOFF_MAX"))?,
            exponential_start: ExponentialBackoffStart::default()
                .maybe_update(env.get("EXPONENTIAL_BACKOFF_START"))?,
            exponential_max: ExponentialBackoffMax::default()
                .maybe_update(env.get("EXPONENTIAL_BACKOFF_MAX"))?,
            backoff_reset: BackoffReset::default().maybe_update(env.get("BACKOFF_RESET"))?,
            max_saved_tweet_ids: MaxSavedTweetIds::default()
                .maybe_update(env.get("MAX_SAVED_TWEET_IDS"))?,
            max_users: MaxUsers::default().maybe_update(env.get("MAX_USERS"))?,
            max_initial_users: MaxInitialUsers::default()
                .maybe_update(env.get("MAX_INITIAL_USERS"))?,
            max_users_per_request: MaxUsersPerRequest::default()
                .maybe_update(env.get("MAX_USERS_PER_REQUEST"))?,
            add_user_timeout: AddUserTimeout::default().maybe_update(env.get("ADD_USER_TIMEOUT"))?,
            site_stream_host: SiteStreamHost::default().maybe_update(env.get("SITE_STREAM_HOST"))?,
            bearer_token: BearerToken::default().maybe_update(env.get("BEARER_TOKEN"))?,
        };

        if *cfg.linear_start > *cfg.linear_max {
            Err(FatalErr::config(
                "LINEAR_BACKOFF_START",
                format!("{:?}", *cfg.linear_start),
                "no larger than LINEAR_BACKOFF_MAX",
            ))?;
        }
        if *cfg.exponential_start > *cfg.exponential_max {
            Err(FatalErr::config(
                "EXPONENTIAL_BACKOFF_START",
                format!("{:?}", *cfg.exponential_start),
                "no larger than EXPONENTIAL_BACKOFF_MAX",
            ))?;
        }
        log::info!("Stream configuration:\n{}", &cfg);
        Ok(cfg)
    }

    /// The `(start, max)` delay pair for a backoff algorithm.
    pub fn backoff(&self, algorithm: Algorithm) -> (Duration, Duration) {
        match algorithm {
            Algorithm::Linear => (*self.linear_start, *self.linear_max),
            Algorithm::Exponential => (*self.exponential_start, *self.exponential_max),
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    requests per second: {:?}", self.max_requests_per_second)?;
        writeln!(f, "    request timeout: {:?}", self.request_timeout)?;
        writeln!(f, "    queue timeout: {:?}", self.queue_timeout)?;
        writeln!(f, "    stall timeout: {:?}", self.stall_timeout)?;
        writeln!(f, "    linear backoff: {:?}..{:?}", self.linear_start, self.linear_max)?;
        writeln!(
            f,
            "    exponential backoff: {:?}..{:?}",
            self.exponential_start, self.exponential_max
        )?;
        writeln!(f, "    backoff reset: {:?}", self.backoff_reset)?;
        writeln!(f, "    saved tweet ids: {:?}", self.max_saved_tweet_ids)?;
        writeln!(
            f,
            "    site stream users: {:?} (initial {:?}, per request {:?})",
            self.max_users, self.max_initial_users, self.max_users_per_request
        )?;
        writeln!(f, "    pool add-user window: {:?}", self.add_user_timeout)?;
        writeln!(f, "    site stream host: {}", self.site_stream_host.as_str())?;
        write!(f, "    bearer token set: {}", self.bearer_token.is_set())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hashbrown::HashMap;

    fn env(pairs: &[(&str, &str)]) -> EnvVar {
        EnvVar::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn defaults_match_the_documented_constants() {
        let cfg = Config::from_env(env(&[])).expect("defaults are valid");
        assert_eq!(*cfg.max_requests_per_second, 25);
        assert_eq!(*cfg.stall_timeout, Duration::from_secs(90));
        assert_eq!(
            cfg.backoff(Algorithm::Linear),
            (Duration::from_millis(250), Duration::from_secs(16))
        );
        assert_eq!(
            cfg.backoff(Algorithm::Exponential),
            (Duration::from_secs(5), Duration::from_secs(320))
        );
        assert_eq!(*cfg.max_users, 1000);
        assert_eq!(*cfg.max_initial_users, 100);
        assert_eq!(*cfg.max_users_per_request, 100);
        assert_eq!(*cfg.add_user_timeout, Duration::from_secs(1));
        assert_eq!(*cfg.max_saved_tweet_ids, 5000);
        assert_eq!(cfg.site_stream_host.as_str(), "https://sitestream.twitter.com/");
        assert!(!cfg.bearer_token.is_set());
    }

    #[test]
    fn env_vars_override_defaults() {
        let cfg = Config::from_env(env(&[
            ("STALL_TIMEOUT", "1000"),
            ("MAX_USERS", "10"),
            ("BEARER_TOKEN", "secret"),
            ("MAX_SAVED_TWEET_IDS", ""),
        ]))
        .expect("valid overrides");
        assert_eq!(*cfg.stall_timeout, Duration::from_secs(1));
        assert_eq!(*cfg.max_users, 10);
        assert_eq!(cfg.bearer_token.as_deref(), Some("secret"));
        assert_eq!(*cfg.max_saved_tweet_ids, 5000);
    }

    #[test]
    fn invalid_values_are_fatal() {
        assert!(Config::from_env(env(&[("MAX_USERS", "0")])).is_err());
        assert!(Config::from_env(env(&[("QUEUE_TIMEOUT", "soon")])).is_err());
        assert!(Config::from_env(env(&[("SITE_STREAM_HOST", "not a url")])).is_err());
        assert!(Config::from_env(env(&[("LINEAR_BACKOFF_START", "20000")])).is_err());
    }
}
