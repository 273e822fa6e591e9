//! Parsing of inter-service references using `nom`.
//!
//! Services point at each other through three textual forms:
//! - links: `target[:alias]`
//! - volumes-from: `[service:|container:]target[:ro|:rw]`
//! - namespace modes (`net`, `ipc`): `container:target`, `service:target`, or a plain mode.

use convoy_common::error::{ConvoyError, Result};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::char,
    combinator::{all_consuming, opt, value},
    sequence::{preceded, terminated},
};

/// A parsed `links` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    /// Linked service name.
    pub target: String,
    /// Alias the target is reachable under, if different.
    pub alias: Option<String>,
}

/// What a `volumes_from` entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Another service in the project.
    Service,
    /// A container outside the project.
    Container,
}

/// A parsed `volumes_from` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumesFromRef {
    /// Source service or container name.
    pub target: String,
    /// Whether the source is a service or an external container.
    pub kind: SourceKind,
    /// Whether the volumes are mounted read-only.
    pub read_only: bool,
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != ':' && !c.is_whitespace()).parse(input)
}

fn source_prefix(input: &str) -> IResult<&str, SourceKind> {
    terminated(
        alt((
            value(SourceKind::Service, tag("service")),
            value(SourceKind::Container, tag("container")),
        )),
        char(':'),
    )
    .parse(input)
}

fn mode(input: &str) -> IResult<&str, bool> {
    preceded(char(':'), alt((value(true, tag("ro")), value(false, tag("rw"))))).parse(input)
}

/// Parses a `links` entry.
///
/// # Errors
///
/// Returns an error if the entry is empty or has more than one `:`.
pub fn parse_link(input: &str) -> Result<LinkRef> {
    let (_, (target, alias)) = all_consuming((name, opt(preceded(char(':'), name))))
        .parse(input.trim())
        .map_err(|_| invalid("link", input))?;
    Ok(LinkRef {
        target: target.to_string(),
        alias: alias.filter(|a| *a != target).map(str::to_string),
    })
}

/// Parses a `volumes_from` entry.
///
/// # Errors
///
/// Returns an error if the entry is empty or carries an unknown mode.
pub fn parse_volumes_from(input: &str) -> Result<VolumesFromRef> {
    let (_, (kind, target, read_only)) = all_consuming((opt(source_prefix), name, opt(mode)))
        .parse(input.trim())
        .map_err(|_| invalid("volumes_from", input))?;
    Ok(VolumesFromRef {
        target: target.to_string(),
        kind: kind.unwrap_or(SourceKind::Service),
        read_only: read_only.unwrap_or(false),
    })
}

/// Parses a `net`/`ipc` mode, returning the service whose namespace is shared.
///
/// Plain modes such as `host` or `bridge` yield `None`.
#[must_use]
pub fn parse_namespace(input: &str) -> Option<String> {
    all_consuming(preceded(source_prefix, name))
        .parse(input.trim())
        .ok()
        .map(|(_, target)| target.to_string())
}

fn invalid(kind: &str, input: &str) -> ConvoyError {
    ConvoyError::Config {
        message: format!("invalid {kind} reference: {input:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_without_alias() {
        let link = parse_link("db").unwrap();
        assert_eq!(link.target, "db");
        assert!(link.alias.is_none());
    }

    #[test]
    fn link_with_alias() {
        let link = parse_link("db:database").unwrap();
        assert_eq!(link.target, "db");
        assert_eq!(link.alias.as_deref(), Some("database"));
    }

    #[test]
    fn link_alias_equal_to_target_is_dropped() {
        assert!(parse_link("db:db").unwrap().alias.is_none());
    }

    #[test]
    fn malformed_links_are_rejected() {
        assert!(parse_link("").is_err());
        assert!(parse_link("a:b:c").is_err());
        assert!(parse_link("db:").is_err());
    }

    #[test]
    fn volumes_from_forms() {
        let plain = parse_volumes_from("data").unwrap();
        assert_eq!(plain.kind, SourceKind::Service);
        assert!(!plain.read_only);

        let ro = parse_volumes_from("service:data:ro").unwrap();
        assert_eq!(ro.target, "data");
        assert!(ro.read_only);

        let external = parse_volumes_from("container:legacy:rw").unwrap();
        assert_eq!(external.kind, SourceKind::Container);
        assert_eq!(external.target, "legacy");
    }

    #[test]
    fn volumes_from_rejects_unknown_mode() {
        assert!(parse_volumes_from("data:rx").is_err());
    }

    #[test]
    fn namespace_modes() {
        assert_eq!(parse_namespace("container:network").as_deref(), Some("network"));
        assert_eq!(parse_namespace("service:vpn").as_deref(), Some("vpn"));
        assert_eq!(parse_namespace("host"), None);
        assert_eq!(parse_namespace("bridge"), None);
    }
}
