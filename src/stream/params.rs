//! Comma-joined list parameters such as `track` and `follow`.
//!
//! A list parameter is stored as its wire form, but edited as a sorted set so that adding a
//! term twice or removing one that is absent is caught rather than silently ignored.
use super::ParamErr;
use crate::request::Params;

use std::collections::BTreeSet;

pub(crate) const STALL_WARNINGS: &str = "stall_warnings";

/// Fills in the parameters every stream sends unless told otherwise.
pub(crate) fn with_defaults(mut params: Params) -> Params {
    params
        .entry(STALL_WARNINGS.to_string())
        .or_insert_with(|| "true".to_string());
    params
}

pub(crate) fn list(params: &Params, key: &str) -> BTreeSet<String> {
    params
        .get(key)
        .map(|joined| {
            joined
                .split(',')
                .map(str::trim)
                .filter(|term| !term.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn store(params: &mut Params, key: &str, terms: BTreeSet<String>) {
    if terms.is_empty() {
        params.remove(key);
    } else {
        let joined = terms.into_iter().collect::<Vec<_>>().join(",");
        params.insert(key.to_string(), joined);
    }
}

/// Adds every term or none of them.
pub(crate) fn add<S: AsRef<str>>(params: &mut Params, key: &str, terms: &[S]) -> Result<(), ParamErr> {
    let mut current = list(params, key);
    for term in terms {
        let term = term.as_ref().trim();
        if term.is_empty() || term.contains(',') {
            return Err(ParamErr::InvalidTerm(term.to_string()));
        }
        if !current.insert(term.to_string()) {
            return Err(ParamErr::AlreadyPresent {
                param: key.to_string(),
                term: term.to_string(),
            });
        }
    }
    store(params, key, current);
    Ok(())
}

/// Removes every term or none of them.
pub(crate) fn remove<S: AsRef<str>>(
    params: &mut Params,
    key: &str,
    terms: &[S],
) -> Result<(), ParamErr> {
    let mut current = list(params, key);
    for term in terms {
        let term = term.as_ref().trim();
        if !current.remove(term) {
            return Err(ParamErr::NotPresent {
                param: key.to_string(),
                term: term.to_string(),
            });
        }
    }
    store(params, key, current);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn terms_are_kept_sorted() {
        let mut params = Params::new();
        add(&mut params, "track", &["foo"]).expect("new term");
        add(&mut params, "track", &["bar"]).expect("new term");
        assert_eq!(params["track"], "bar,foo");
    }

    #[test]
    fn duplicates_and_missing_terms_are_errors() {
        let mut params = Params::new();
        add(&mut params, "track", &["foo", "bar"]).expect("new terms");

        assert_eq!(
            add(&mut params, "track", &["baz", "foo"]),
            Err(ParamErr::AlreadyPresent {
                param: "track".into(),
                term: "foo".into()
            })
        );
        assert_eq!(params["track"], "bar,foo");
        assert_eq!(
            remove(&mut params, "track", &["qux"]).map_err(|e| e.to_string()),
            Err("Not tracking qux".to_string())
        );
        assert_eq!(
            add(&mut params, "track", &["a,b"]),
            Err(ParamErr::InvalidTerm("a,b".into()))
        );
    }

    #[test]
    fn removing_the_last_term_drops_the_param() {
        let mut params = with_defaults(Params::new());
        add(&mut params, "track", &["foo"]).expect("new term");
        remove(&mut params, "track", &["foo"]).expect("present term");
        assert!(!params.contains_key("track"));
        assert_eq!(params[STALL_WARNINGS], "true");
    }
}
