use crate::config::XML_BUF_SIZE;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::io::BufRead;
use std::mem;
use tracing::warn;

/// Control handle the scanner passes into every machine callback.
///
/// A machine that has materialized a complete value calls [`suspend`] to
/// stop the event pump at the current event boundary; the scanner's caller
/// can then pick the value up and later re-enter via
/// [`XmlScanner::resume`].
///
/// [`suspend`]: Suspender::suspend
#[derive(Debug, Default)]
pub struct Suspender {
    armed: bool,
}

impl Suspender {
    pub fn suspend(&mut self) {
        self.armed = true;
    }

    fn take(&mut self) -> bool {
        mem::take(&mut self.armed)
    }
}

/// The three event kinds a machine receives from the scanner.
///
/// Event-supplied views (`text`, `tag`) are only valid for the duration of
/// the callback; machines copy what they need into their own buffers.
pub trait Machine {
    fn on_chars(&mut self, ctl: &mut Suspender, text: &str);

    /// `tag` carries the full attribute list of the opening element, in
    /// document order.
    fn on_begin(&mut self, ctl: &mut Suspender, elem: &[u8], tag: &BytesStart<'_>);

    fn on_end(&mut self, ctl: &mut Suspender, elem: &[u8]);
}

/// Outcome of one `walk`/`resume` pass over the byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A machine suspended the pump; re-enter with `resume`.
    Suspended,
    /// The document ended without error.
    Finished,
    /// The underlying parser reported an error; the scanner is done.
    Failed,
}

/// Event pump over a byte source.
///
/// Dispatches character data, element-begin and element-end events into a
/// [`Machine`] one at a time, checking the [`Suspender`] after each event,
/// so suspension always lands on an event boundary. Empty elements such as
/// `<minor/>` are dispatched as a begin immediately followed by an end.
pub struct XmlScanner<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    ctl: Suspender,
    done: bool,
}

impl<R: BufRead> XmlScanner<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::with_capacity(XML_BUF_SIZE),
            ctl: Suspender::default(),
            done: false,
        }
    }

    /// Starts pumping events into `machine` from the top of the document.
    pub fn walk<M: Machine>(&mut self, machine: &mut M) -> Scan {
        self.pump(machine)
    }

    /// Re-enters a previously suspended pump.
    pub fn resume<M: Machine>(&mut self, machine: &mut M) -> Scan {
        self.pump(machine)
    }

    fn pump<M: Machine>(&mut self, machine: &mut M) -> Scan {
        if self.done {
            return Scan::Finished;
        }
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(tag)) => {
                    machine.on_begin(&mut self.ctl, tag.name().as_ref(), &tag);
                }
                Ok(Event::Empty(tag)) => {
                    machine.on_begin(&mut self.ctl, tag.name().as_ref(), &tag);
                    machine.on_end(&mut self.ctl, tag.name().as_ref());
                }
                Ok(Event::End(tag)) => {
                    machine.on_end(&mut self.ctl, tag.name().as_ref());
                }
                Ok(Event::Text(text)) => match text.unescape() {
                    Ok(text) => machine.on_chars(&mut self.ctl, &text),
                    Err(err) => {
                        warn!(error = %err, "malformed character data");
                        self.done = true;
                        return Scan::Failed;
                    }
                },
                Ok(Event::CData(data)) => {
                    machine.on_chars(&mut self.ctl, &String::from_utf8_lossy(&data));
                }
                Ok(Event::Eof) => {
                    self.done = true;
                    return Scan::Finished;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(
                        position = self.reader.buffer_position(),
                        error = %err,
                        "XML parse error"
                    );
                    self.done = true;
                    return Scan::Failed;
                }
            }
            if self.ctl.take() {
                return Scan::Suspended;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every event as a string; suspends on a configurable end tag.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        suspend_on_end: Option<&'static str>,
    }

    impl Machine for Recorder {
        fn on_chars(&mut self, _ctl: &mut Suspender, text: &str) {
            self.events.push(format!("chars:{text}"));
        }

        fn on_begin(&mut self, _ctl: &mut Suspender, elem: &[u8], tag: &BytesStart<'_>) {
            let attrs: Vec<String> = tag
                .attributes()
                .flatten()
                .map(|attr| {
                    format!(
                        "{}={}",
                        String::from_utf8_lossy(attr.key.as_ref()),
                        String::from_utf8_lossy(&attr.value)
                    )
                })
                .collect();
            self.events.push(format!(
                "begin:{}[{}]",
                String::from_utf8_lossy(elem),
                attrs.join(",")
            ));
        }

        fn on_end(&mut self, ctl: &mut Suspender, elem: &[u8]) {
            let elem = String::from_utf8_lossy(elem).into_owned();
            if self.suspend_on_end == Some(elem.as_str()) {
                ctl.suspend();
            }
            self.events.push(format!("end:{elem}"));
        }
    }

    #[test]
    fn forwards_events_in_document_order() {
        let xml = r#"<a><b k="v">hi</b></a>"#;
        let mut scanner = XmlScanner::new(xml.as_bytes());
        let mut recorder = Recorder::default();

        assert_eq!(scanner.walk(&mut recorder), Scan::Finished);
        assert_eq!(
            recorder.events,
            vec!["begin:a[]", "begin:b[k=v]", "chars:hi", "end:b", "end:a"]
        );
    }

    #[test]
    fn empty_element_becomes_begin_then_end() {
        let xml = r#"<a><minor/></a>"#;
        let mut scanner = XmlScanner::new(xml.as_bytes());
        let mut recorder = Recorder::default();

        scanner.walk(&mut recorder);
        assert_eq!(
            recorder.events,
            vec!["begin:a[]", "begin:minor[]", "end:minor", "end:a"]
        );
    }

    #[test]
    fn attributes_preserve_document_order() {
        let xml = r#"<a><t b="1" a="2" c="3"/></a>"#;
        let mut scanner = XmlScanner::new(xml.as_bytes());
        let mut recorder = Recorder::default();

        scanner.walk(&mut recorder);
        assert!(recorder.events.contains(&"begin:t[b=1,a=2,c=3]".to_string()));
    }

    #[test]
    fn unescapes_character_data() {
        let xml = r#"<a>AT&amp;T</a>"#;
        let mut scanner = XmlScanner::new(xml.as_bytes());
        let mut recorder = Recorder::default();

        scanner.walk(&mut recorder);
        assert!(recorder.events.contains(&"chars:AT&T".to_string()));
    }

    #[test]
    fn suspension_stops_at_event_boundary_and_resumes() {
        let xml = r#"<a><p>one</p><p>two</p></a>"#;
        let mut scanner = XmlScanner::new(xml.as_bytes());
        let mut recorder = Recorder {
            suspend_on_end: Some("p"),
            ..Recorder::default()
        };

        assert_eq!(scanner.walk(&mut recorder), Scan::Suspended);
        assert_eq!(recorder.events.last().unwrap(), "end:p");
        let seen = recorder.events.len();

        assert_eq!(scanner.resume(&mut recorder), Scan::Suspended);
        assert!(recorder.events.len() > seen);
        assert_eq!(recorder.events.last().unwrap(), "end:p");

        assert_eq!(scanner.resume(&mut recorder), Scan::Finished);
        assert_eq!(recorder.events.last().unwrap(), "end:a");
    }

    #[test]
    fn empty_input_finishes_immediately() {
        let mut scanner = XmlScanner::new(&b""[..]);
        let mut recorder = Recorder::default();
        assert_eq!(scanner.walk(&mut recorder), Scan::Finished);
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn malformed_xml_fails() {
        let xml = r#"<a><b>oops</a>"#;
        let mut scanner = XmlScanner::new(xml.as_bytes());
        let mut recorder = Recorder::default();
        assert_eq!(scanner.walk(&mut recorder), Scan::Failed);
    }

    #[test]
    fn pump_after_completion_reports_finished() {
        let mut scanner = XmlScanner::new(&b"<a/>"[..]);
        let mut recorder = Recorder::default();
        assert_eq!(scanner.walk(&mut recorder), Scan::Finished);
        assert_eq!(scanner.resume(&mut recorder), Scan::Finished);
    }
}
