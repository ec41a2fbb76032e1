use crate::machines::PageMachine;
use crate::models::Page;
use crate::scanner::{Scan, XmlScanner};
use std::io::BufRead;
use std::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Init,
    Next,
    Term,
}

/// Pull-style page iterator over a dump byte source.
///
/// Drives the scanner until the page machine suspends it, then exposes the
/// materialized page through [`current`]. Pages come out in document
/// order, each exactly once; after the document is exhausted (or a parse
/// error is hit) every further [`advance`] returns false.
///
/// [`advance`]: PageReader::advance
/// [`current`]: PageReader::current
pub struct PageReader<R: BufRead> {
    scanner: XmlScanner<R>,
    machine: PageMachine,
    cursor: Cursor,
    page: Page,
    failed: bool,
}

impl<R: BufRead> PageReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            scanner: XmlScanner::new(source),
            machine: PageMachine::default(),
            cursor: Cursor::Init,
            page: Page::default(),
            failed: false,
        }
    }

    /// Advances to the next page; returns whether one was produced.
    pub fn advance(&mut self) -> bool {
        let scan = match self.cursor {
            Cursor::Init => self.scanner.walk(&mut self.machine),
            Cursor::Next => self.scanner.resume(&mut self.machine),
            Cursor::Term => return false,
        };
        match scan {
            Scan::Suspended => {
                self.page = self.machine.take_page();
                self.cursor = Cursor::Next;
                true
            }
            Scan::Finished => {
                self.cursor = Cursor::Term;
                false
            }
            Scan::Failed => {
                self.failed = true;
                self.cursor = Cursor::Term;
                false
            }
        }
    }

    /// The page produced by the most recent successful [`advance`].
    ///
    /// [`advance`]: PageReader::advance
    pub fn current(&self) -> &Page {
        &self.page
    }

    /// True when iteration stopped on an XML error rather than end of
    /// input.
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl<R: BufRead> Iterator for PageReader<R> {
    type Item = Page;

    fn next(&mut self) -> Option<Page> {
        if self.advance() {
            Some(mem::take(&mut self.page))
        } else {
            None
        }
    }
}
