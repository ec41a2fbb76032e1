/// One namespace entry from the dump's `<siteinfo>` preamble.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Namespace {
    pub key: i64,
    pub case: String,
    pub name: String,
}

/// Site-wide metadata emitted once at the top of a dump, before any page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteInfo {
    pub sitename: String,
    pub dbname: String,
    pub base: String,
    pub generator: String,
    pub case: String,
    pub namespaces: Vec<Namespace>,
}

/// Author of a revision: either an account (username + id), an IP address,
/// or deleted (all identifying fields absent).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contributor {
    pub username: Option<String>,
    pub id: Option<u64>,
    pub ip: Option<String>,
    pub deleted: bool,
}

/// One edit state of a page. `timestamp` is milliseconds since the Unix
/// epoch, parsed as UTC.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Revision {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub timestamp: u64,
    pub contributor: Contributor,
    pub minor: bool,
    pub comment: Option<String>,
    pub model: String,
    pub format: String,
    pub text: String,
    pub sha1: String,
}

/// A wiki page plus its revision history, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub title: String,
    pub ns: u64,
    pub id: u64,
    pub redirect: Option<String>,
    pub restrictions: Option<String>,
    pub revisions: Vec<Revision>,
}
