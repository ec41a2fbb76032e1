//! Element-scoped state machines.
//!
//! Each machine extracts exactly one element subtree into one value type
//! and composes by delegation: while a parent is inside a child element it
//! forwards begin/end/character events verbatim to the child machine and
//! takes a snapshot of the child's value when the child's root element
//! closes. Optional elements are skipped by falling through to the next
//! expected state when an unexpected tag arrives, so no backtracking is
//! ever needed.

use crate::models::{Contributor, Page, Revision, SiteInfo};
use crate::scanner::{Machine, Suspender};
use crate::util::{parse_timestamp, parse_u64};
use quick_xml::events::BytesStart;
use std::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SiteInfoState {
    Begin,
    SiteName,
    DbName,
    Base,
    Generator,
    Case,
    End,
}

/// Extracts the `<siteinfo>` preamble. Fields are read in the fixed order
/// `sitename, dbname, base, generator, case`; the `<namespaces>` subtree is
/// consumed but not extracted.
pub struct SiteInfoMachine {
    state: SiteInfoState,
    text: String,
    info: SiteInfo,
}

impl Default for SiteInfoMachine {
    fn default() -> Self {
        Self {
            state: SiteInfoState::Begin,
            text: String::new(),
            info: SiteInfo::default(),
        }
    }
}

impl SiteInfoMachine {
    pub fn snapshot(&self) -> SiteInfo {
        self.info.clone()
    }
}

impl Machine for SiteInfoMachine {
    fn on_chars(&mut self, _ctl: &mut Suspender, text: &str) {
        use SiteInfoState::*;
        match self.state {
            SiteName | DbName | Base | Generator | Case => self.text.push_str(text),
            _ => {}
        }
    }

    fn on_begin(&mut self, _ctl: &mut Suspender, elem: &[u8], _tag: &BytesStart<'_>) {
        use SiteInfoState::*;
        if self.state == Begin {
            if elem == b"siteinfo" {
                self.info = SiteInfo::default();
                self.state = SiteName;
            }
            return;
        }
        if self.state == SiteName {
            if elem == b"sitename" {
                self.text.clear();
                return;
            }
            self.state = DbName;
        }
        if self.state == DbName {
            if elem == b"dbname" {
                self.text.clear();
                return;
            }
            self.state = Base;
        }
        if self.state == Base {
            if elem == b"base" {
                self.text.clear();
                return;
            }
            self.state = Generator;
        }
        if self.state == Generator {
            if elem == b"generator" {
                self.text.clear();
                return;
            }
            self.state = Case;
        }
        if self.state == Case {
            if elem == b"case" {
                self.text.clear();
                return;
            }
            self.state = End;
        }
    }

    fn on_end(&mut self, _ctl: &mut Suspender, elem: &[u8]) {
        use SiteInfoState::*;
        if self.state == SiteName {
            if elem == b"sitename" {
                self.info.sitename = self.text.clone();
                self.state = DbName;
                return;
            }
            self.state = DbName;
        }
        if self.state == DbName {
            if elem == b"dbname" {
                self.info.dbname = self.text.clone();
                self.state = Base;
                return;
            }
            self.state = Base;
        }
        if self.state == Base {
            if elem == b"base" {
                self.info.base = self.text.clone();
                self.state = Generator;
                return;
            }
            self.state = Generator;
        }
        if self.state == Generator {
            if elem == b"generator" {
                self.info.generator = self.text.clone();
                self.state = Case;
                return;
            }
            self.state = Case;
        }
        if self.state == Case {
            if elem == b"case" {
                self.info.case = self.text.clone();
                self.state = End;
                return;
            }
            self.state = End;
        }
        if self.state == End && elem == b"siteinfo" {
            self.state = Begin;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContributorState {
    Begin,
    Username,
    Id,
    Ip,
    End,
}

/// Extracts one `<contributor>` element.
///
/// The `deleted` attribute sets the flag on presence alone; its value is
/// ignored. The three leaf states fall through one another, so a deleted
/// contributor (no leaves at all) transitions cleanly to the end state on
/// the closing tag.
pub struct ContributorMachine {
    state: ContributorState,
    text: String,
    contributor: Contributor,
}

impl Default for ContributorMachine {
    fn default() -> Self {
        Self {
            state: ContributorState::Begin,
            text: String::new(),
            contributor: Contributor::default(),
        }
    }
}

impl ContributorMachine {
    pub fn snapshot(&self) -> Contributor {
        self.contributor.clone()
    }
}

impl Machine for ContributorMachine {
    fn on_chars(&mut self, _ctl: &mut Suspender, text: &str) {
        use ContributorState::*;
        match self.state {
            Username | Id | Ip => self.text.push_str(text),
            _ => {}
        }
    }

    fn on_begin(&mut self, _ctl: &mut Suspender, elem: &[u8], tag: &BytesStart<'_>) {
        use ContributorState::*;
        if self.state == Begin {
            if elem == b"contributor" {
                self.contributor = Contributor::default();
                for attr in tag.attributes().flatten() {
                    if attr.key.as_ref() == b"deleted" {
                        self.contributor.deleted = true;
                    }
                }
                self.state = Username;
            }
            return;
        }
        if self.state == Username {
            if elem == b"username" {
                self.text.clear();
                return;
            }
            self.state = Id;
        }
        if self.state == Id {
            if elem == b"id" {
                self.text.clear();
                return;
            }
            self.state = Ip;
        }
        if self.state == Ip {
            if elem == b"ip" {
                self.text.clear();
                return;
            }
            self.state = End;
        }
    }

    fn on_end(&mut self, _ctl: &mut Suspender, elem: &[u8]) {
        use ContributorState::*;
        if self.state == Username {
            if elem == b"username" {
                self.contributor.username = Some(self.text.clone());
                self.state = Id;
                return;
            }
            self.state = Id;
        }
        if self.state == Id {
            if elem == b"id" {
                if let Some(id) = parse_u64(&self.text) {
                    self.contributor.id = Some(id);
                }
                self.state = Ip;
                return;
            }
            self.state = Ip;
        }
        if self.state == Ip {
            if elem == b"ip" {
                self.contributor.ip = Some(self.text.clone());
                self.state = End;
                return;
            }
            self.state = End;
        }
        if self.state == End && elem == b"contributor" {
            self.state = Begin;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevisionState {
    Begin,
    Id,
    ParentId,
    Timestamp,
    ContributorBegin,
    Contributor,
    Minor,
    Comment,
    Model,
    Format,
    Text,
    Sha1,
    End,
}

/// Extracts one `<revision>` element, delegating `<contributor>` to a
/// nested [`ContributorMachine`].
///
/// The text buffers are deliberately persistent: on `<revision>` the
/// previous revision's text allocation is moved into the fresh value
/// (cleared, capacity kept), and on `</text>` the accumulator and the
/// revision buffer swap. Revision texts run to many megabytes, so neither
/// buffer is ever reallocated across revisions.
pub struct RevisionMachine {
    state: RevisionState,
    text: String,
    revision: Revision,
    contrib: ContributorMachine,
}

impl Default for RevisionMachine {
    fn default() -> Self {
        Self {
            state: RevisionState::Begin,
            text: String::new(),
            revision: Revision::default(),
            contrib: ContributorMachine::default(),
        }
    }
}

impl RevisionMachine {
    pub fn snapshot(&self) -> Revision {
        self.revision.clone()
    }
}

impl Machine for RevisionMachine {
    fn on_chars(&mut self, ctl: &mut Suspender, text: &str) {
        match self.state {
            RevisionState::Id
            | RevisionState::ParentId
            | RevisionState::Timestamp
            | RevisionState::Minor
            | RevisionState::Comment
            | RevisionState::Model
            | RevisionState::Format
            | RevisionState::Text
            | RevisionState::Sha1 => self.text.push_str(text),
            RevisionState::Contributor => self.contrib.on_chars(ctl, text),
            _ => {}
        }
    }

    fn on_begin(&mut self, ctl: &mut Suspender, elem: &[u8], tag: &BytesStart<'_>) {
        match self.state {
            RevisionState::Begin => {
                if elem == b"revision" {
                    // Keep the large text allocation across revisions.
                    let mut text = mem::take(&mut self.revision.text);
                    text.clear();
                    self.revision = Revision::default();
                    self.revision.text = text;
                    self.state = RevisionState::Id;
                }
                return;
            }
            RevisionState::ContributorBegin => {
                if elem == b"contributor" {
                    self.state = RevisionState::Contributor;
                    self.contrib.on_begin(ctl, elem, tag);
                }
                return;
            }
            RevisionState::Contributor => {
                self.contrib.on_begin(ctl, elem, tag);
                return;
            }
            _ => {}
        }
        if self.state == RevisionState::Id {
            if elem == b"id" {
                self.text.clear();
            }
            return;
        }
        if self.state == RevisionState::ParentId {
            if elem == b"parentid" {
                self.text.clear();
                return;
            }
            self.state = RevisionState::Timestamp;
        }
        if self.state == RevisionState::Timestamp {
            if elem == b"timestamp" {
                self.text.clear();
            }
            return;
        }
        if self.state == RevisionState::Minor && elem == b"minor" {
            self.text.clear();
            return;
        }
        if (self.state == RevisionState::Minor || self.state == RevisionState::Comment)
            && elem == b"comment"
        {
            self.state = RevisionState::Comment;
            self.text.clear();
            return;
        }
        if self.state == RevisionState::Minor
            || self.state == RevisionState::Comment
            || self.state == RevisionState::Model
        {
            if elem == b"model" {
                self.state = RevisionState::Model;
                self.text.clear();
            }
            return;
        }
        if self.state == RevisionState::Format {
            if elem == b"format" {
                self.text.clear();
            }
            return;
        }
        if self.state == RevisionState::Text {
            if elem == b"text" {
                self.text.clear();
                // Pre-size the accumulator for large revisions.
                if let Ok(Some(attr)) = tag.try_get_attribute("bytes") {
                    if let Some(hint) = parse_u64(&String::from_utf8_lossy(&attr.value)) {
                        self.text.reserve(hint as usize);
                    }
                }
            }
            return;
        }
        if self.state == RevisionState::Sha1 && elem == b"sha1" {
            self.text.clear();
        }
    }

    fn on_end(&mut self, ctl: &mut Suspender, elem: &[u8]) {
        match self.state {
            RevisionState::Id => {
                if let Some(id) = parse_u64(&self.text) {
                    self.revision.id = id;
                }
                self.state = RevisionState::ParentId;
            }
            RevisionState::ParentId => {
                if let Some(parent) = parse_u64(&self.text) {
                    self.revision.parent_id = Some(parent);
                }
                self.state = RevisionState::Timestamp;
            }
            RevisionState::Timestamp => {
                if let Some(timestamp) = parse_timestamp(&self.text) {
                    self.revision.timestamp = timestamp;
                }
                self.state = RevisionState::ContributorBegin;
            }
            RevisionState::Contributor => {
                self.contrib.on_end(ctl, elem);
                if elem == b"contributor" {
                    self.revision.contributor = self.contrib.snapshot();
                    self.state = RevisionState::Minor;
                }
            }
            RevisionState::Minor => {
                self.revision.minor = true;
                self.state = RevisionState::Comment;
            }
            RevisionState::Comment => {
                self.revision.comment = Some(self.text.clone());
                self.state = RevisionState::Model;
            }
            RevisionState::Model => {
                if elem == b"model" {
                    self.revision.model = self.text.clone();
                    self.state = RevisionState::Format;
                }
            }
            RevisionState::Format => {
                self.revision.format = self.text.clone();
                self.state = RevisionState::Text;
            }
            RevisionState::Text => {
                mem::swap(&mut self.revision.text, &mut self.text);
                self.state = RevisionState::Sha1;
            }
            RevisionState::Sha1 => {
                self.revision.sha1 = self.text.clone();
                self.state = RevisionState::End;
            }
            RevisionState::End => {
                if elem == b"revision" {
                    self.state = RevisionState::Begin;
                }
            }
            RevisionState::Begin | RevisionState::ContributorBegin => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageState {
    Begin,
    Title,
    Ns,
    Id,
    Redirect,
    Restrictions,
    AltRevisionUpload,
    Revision,
    Upload,
    DiscussionThreadingInfo,
    End,
}

/// Extracts `<page>` elements one at a time, delegating each `<revision>`
/// to a nested [`RevisionMachine`]. `<upload>` and
/// `<discussionthreadinginfo>` subtrees are consumed without extraction.
///
/// A depth counter tracks the element nesting across the whole document;
/// when the closing `</page>` brings the depth back to the document root's
/// children the machine suspends the scanner and resets itself, leaving
/// the finished page for [`take_page`].
///
/// [`take_page`]: PageMachine::take_page
pub struct PageMachine {
    depth: i32,
    state: PageState,
    text: String,
    page: Page,
    rev: RevisionMachine,
}

impl Default for PageMachine {
    fn default() -> Self {
        Self {
            depth: 0,
            state: PageState::Begin,
            text: String::new(),
            page: Page::default(),
            rev: RevisionMachine::default(),
        }
    }
}

impl PageMachine {
    /// Moves the most recently completed page out of the machine.
    pub fn take_page(&mut self) -> Page {
        mem::take(&mut self.page)
    }

    fn route_begin(&mut self, ctl: &mut Suspender, elem: &[u8], tag: &BytesStart<'_>) {
        match self.state {
            PageState::Begin => {
                if elem == b"page" {
                    self.page = Page::default();
                    self.state = PageState::Title;
                }
                return;
            }
            PageState::Title => {
                if elem == b"title" {
                    self.text.clear();
                }
                return;
            }
            PageState::Ns => {
                if elem == b"ns" {
                    self.text.clear();
                }
                return;
            }
            PageState::Id => {
                if elem == b"id" {
                    self.text.clear();
                }
                return;
            }
            PageState::Revision => {
                self.rev.on_begin(ctl, elem, tag);
                return;
            }
            PageState::Upload | PageState::DiscussionThreadingInfo | PageState::End => return,
            _ => {}
        }
        if self.state == PageState::Redirect {
            if elem == b"redirect" {
                if let Ok(Some(attr)) = tag.try_get_attribute("title") {
                    if let Ok(target) = attr.unescape_value() {
                        self.page.redirect = Some(target.into_owned());
                    }
                }
                return;
            }
            self.state = PageState::Restrictions;
        }
        if self.state == PageState::Restrictions {
            if elem == b"restrictions" {
                self.text.clear();
                return;
            }
            self.state = PageState::AltRevisionUpload;
        }
        if self.state == PageState::AltRevisionUpload {
            if elem == b"revision" {
                self.state = PageState::Revision;
                self.rev.on_begin(ctl, elem, tag);
            } else if elem == b"upload" {
                self.state = PageState::Upload;
            } else if elem == b"discussionthreadinginfo" {
                self.state = PageState::DiscussionThreadingInfo;
            } else {
                self.state = PageState::End;
            }
        }
    }

    fn route_end(&mut self, ctl: &mut Suspender, elem: &[u8]) {
        match self.state {
            PageState::Title => {
                self.page.title = self.text.clone();
                self.state = PageState::Ns;
            }
            PageState::Ns => {
                if let Some(ns) = parse_u64(&self.text) {
                    self.page.ns = ns;
                }
                self.state = PageState::Id;
            }
            PageState::Id => {
                if let Some(id) = parse_u64(&self.text) {
                    self.page.id = id;
                }
                self.state = PageState::Redirect;
            }
            PageState::Redirect => {
                self.state = PageState::Restrictions;
            }
            PageState::Restrictions => {
                self.page.restrictions = Some(self.text.clone());
                self.state = PageState::AltRevisionUpload;
            }
            PageState::Revision => {
                self.rev.on_end(ctl, elem);
                if elem == b"revision" {
                    self.page.revisions.push(self.rev.snapshot());
                    self.state = PageState::AltRevisionUpload;
                }
            }
            PageState::Upload => {
                if elem == b"upload" {
                    self.state = PageState::AltRevisionUpload;
                }
            }
            PageState::DiscussionThreadingInfo => {
                if elem == b"discussionthreadinginfo" {
                    self.state = PageState::End;
                }
            }
            PageState::End => {
                if elem == b"page" {
                    self.state = PageState::Begin;
                    ctl.suspend();
                }
            }
            PageState::Begin | PageState::AltRevisionUpload => {}
        }
    }
}

impl Machine for PageMachine {
    fn on_chars(&mut self, ctl: &mut Suspender, text: &str) {
        match self.state {
            PageState::Title
            | PageState::Ns
            | PageState::Id
            | PageState::Redirect
            | PageState::Restrictions => self.text.push_str(text),
            PageState::Revision => self.rev.on_chars(ctl, text),
            _ => {}
        }
    }

    fn on_begin(&mut self, ctl: &mut Suspender, elem: &[u8], tag: &BytesStart<'_>) {
        self.route_begin(ctl, elem, tag);
        self.depth += 1;
    }

    fn on_end(&mut self, ctl: &mut Suspender, elem: &[u8]) {
        self.depth -= 1;
        // The closing </page> is identified by the depth returning to the
        // document root's children, whatever the inner state got to.
        if self.depth == 1 && elem == b"page" {
            self.state = PageState::Begin;
            ctl.suspend();
            return;
        }
        self.route_end(ctl, elem);
    }
}
