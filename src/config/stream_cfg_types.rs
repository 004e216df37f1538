use crate::from_env_var;
use std::time::Duration;
use url::Url;

fn millis(s: &str) -> Option<Duration> {
    s.parse().map(Duration::from_millis).ok()
}

fn positive(s: &str) -> Option<usize> {
    s.parse().ok().filter(|n| *n > 0)
}

from_env_var!(
    /// How many queued requests may start within one second
    let name = MaxRequestsPerSecond;
    let default: u32 = 25;
    let (env_var, allowed_values) = ("MAX_REQUESTS_PER_SECOND", "a number between 1 and 1000");
    let from_str = |s| s.parse().ok().filter(|n| (1..=1000).contains(n));
);
from_env_var!(
    /// How long a one-shot request may take before the transport gives up on it
    let name = RequestTimeout;
    let default: Duration = Duration::from_secs(30);
    let (env_var, allowed_values) = ("REQUEST_TIMEOUT", "a number of milliseconds");
    let from_str = |s| millis(s);
);
from_env_var!(
    /// The longest a single request may hold the queue before the next one is started anyway
    let name = QueueTimeout;
    let default: Duration = Duration::from_secs(90);
    let (env_var, allowed_values) = ("QUEUE_TIMEOUT", "a number of milliseconds");
    let from_str = |s| millis(s);
);
from_env_var!(
    /// How long an open stream may go without receiving any bytes before it is considered stalled
    let name = StallTimeout;
    let default: Duration = Duration::from_secs(90);
    let (env_var, allowed_values) = ("STALL_TIMEOUT", "a number of milliseconds");
    let from_str = |s| millis(s);
);
from_env_var!(
    let name = LinearBackoffStart;
    let default: Duration = Duration::from_millis(250);
    let (env_var, allowed_values) = ("LINEAR_BACKOFF_START", "a number of milliseconds");
    let from_str = |s| millis(s);
);
from_env_var!(
    let name = LinearBackoffMax;
    let default: Duration = Duration::from_secs(16);
    let (env_var, allowed_values) = ("LINEAR_BACKOFF_MAX", "a number of milliseconds");
    let from_str = |s| millis(s);
);
from_env_var!(
    let name = ExponentialBackoffStart;
    let default: Duration = Duration::from_secs(5);
    let (env_var, allowed_values) = ("EXPONENTIAL_BACKOFF_START", "a number of milliseconds");
    let from_str = |s| millis(s);
);
from_env_var!(
    let name = ExponentialBackoffMax;
    let default: Duration = Duration::from_secs(320);
    let (env_var, allowed_values) = ("EXPONENTIAL_BACKOFF_MAX", "a number of milliseconds");
    let from_str = |s| millis(s);
);
from_env_var!(
    /// Quiet period after a successful retry before the backoff starts over
    let name = BackoffReset;
    let default: Duration = Duration::from_secs(30);
    let (env_var, allowed_values) = ("BACKOFF_RESET", "a number of milliseconds");
    let from_str = |s| millis(s);
);
from_env_var!(
    /// How many recent tweet ids are remembered when flagging unique tweets
    let name = MaxSavedTweetIds;
    let default: usize = 5000;
    let (env_var, allowed_values) = ("MAX_SAVED_TWEET_IDS", "a number greater than 0");
    let from_str = |s| positive(s);
);
from_env_var!(
    /// How many users a single site stream will follow
    let name = MaxUsers;
    let default: usize = 1000;
    let (env_var, allowed_values) = ("MAX_USERS", "a number greater than 0");
    let from_str = |s| positive(s);
);
from_env_var!(
    /// How many users are sent as the `follow` parameter when a site stream connects
    let name = MaxInitialUsers;
    let default: usize = 100;
    let (env_var, allowed_values) = ("MAX_INITIAL_USERS", "a number greater than 0");
    let from_str = |s| positive(s);
);
from_env_var!(
    /// How many users are sent in each `add_user` control request
    let name = MaxUsersPerRequest;
    let default: usize = 100;
    let (env_var, allowed_values) = ("MAX_USERS_PER_REQUEST", "a number greater than 0");
    let from_str = |s| positive(s);
);
from_env_var!(
    /// How long a pool waits for more queued users before opening a site stream for them
    let name = AddUserTimeout;
    let default: Duration = Duration::from_secs(1);
    let (env_var, allowed_values) = ("ADD_USER_TIMEOUT", "a number of milliseconds");
    let from_str = |s| millis(s);
);
from_env_var!(
    /// The host that serves site streams and their control endpoints
    let name = SiteStreamHost;
    let default: Url = Url::parse("https://sitestream.twitter.com").expect("hardcoded");
    let (env_var, allowed_values) = ("SITE_STREAM_HOST", "a valid url (e.g., https://sitestream.twitter.com)");
    let from_str = |s| Url::parse(s).ok();
);
from_env_var!(
    /// Sent as a bearer `Authorization` header with every request, if set
    let name = BearerToken;
    let default: Option<String> = None;
    let (env_var, allowed_values) = ("BEARER_TOKEN", "any string");
    let from_str = |s| Some(Some(s.to_string()));
);

impl BearerToken {
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}
