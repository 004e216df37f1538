//! Where each kind of stream lives.
use crate::config::Config;
use url::Url;

const FILTER: &str = "https://stream.twitter.com/1.1/statuses/filter.json";
const SAMPLE: &str = "https://stream.twitter.com/1.1/statuses/sample.json";
const FIREHOSE: &str = "https://stream.twitter.com/1.1/statuses/firehose.json";
const USER: &str = "https://userstream.twitter.com/1.1/user.json";

pub(crate) fn filter() -> Url {
    Url::parse(FILTER).expect("hardcoded")
}

pub(crate) fn sample() -> Url {
    Url::parse(SAMPLE).expect("hardcoded")
}

pub(crate) fn firehose() -> Url {
    Url::parse(FIREHOSE).expect("hardcoded")
}

pub(crate) fn user() -> Url {
    Url::parse(USER).expect("hardcoded")
}

pub(crate) fn site(cfg: &Config) -> Result<Url, url::ParseError> {
    cfg.site_stream_host.0.join("1.1/site.json")
}
