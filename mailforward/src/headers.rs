//! Line-oriented header scanning and the forwarding header rewrite.
//!
//! A raw message is split once into a header segment and a body segment.
//! The header segment is scanned into fields, each made of a start line and
//! its folded continuation lines. Rewrite passes operate on those fields and
//! the result is re-serialized in front of the untouched body bytes.

/// Classification of a physical header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A line starting a new field (`Name: value`).
    FieldStart,
    /// A folded continuation of the previous field.
    Continuation,
    /// A line holding only whitespace; separates header from body.
    Blank,
}

/// Classifies one physical line (including its terminator).
#[must_use]
pub fn classify(line: &[u8]) -> LineKind {
    if line.iter().all(u8::is_ascii_whitespace) {
        LineKind::Blank
    } else if matches!(line.first(), Some(b' ' | b'\t')) {
        LineKind::Continuation
    } else {
        LineKind::FieldStart
    }
}

/// Splits a raw message into `(header, body)`.
///
/// The header is the run of non-blank lines from the start; the body starts
/// at the first blank line, which it keeps. Without a blank line the whole
/// message is header.
#[must_use]
pub fn split_message(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut offset = 0;
    for line in raw.split_inclusive(|byte| *byte == b'\n') {
        if classify(line) == LineKind::Blank {
            return raw.split_at(offset);
        }
        offset += line.len();
    }
    (raw, &[])
}

const CRLF: &[u8] = b"\r\n";
const LF: &[u8] = b"\n";

/// One header field: its start line and folded continuation lines, each
/// kept with its original terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    first: Vec<u8>,
    continuation: Vec<Vec<u8>>,
}

impl HeaderField {
    fn single(name: &str, value: &[u8], line_ending: &[u8]) -> Self {
        let mut first = Vec::with_capacity(name.len() + 2 + value.len() + line_ending.len());
        first.extend_from_slice(name.as_bytes());
        first.extend_from_slice(b": ");
        first.extend_from_slice(value);
        first.extend_from_slice(line_ending);
        Self {
            first,
            continuation: Vec::new(),
        }
    }

    /// Returns the field name, if the start line has one.
    #[must_use]
    pub fn name(&self) -> Option<&[u8]> {
        if classify(&self.first) != LineKind::FieldStart {
            return None;
        }
        let colon = self.first.iter().position(|byte| *byte == b':')?;
        Some(&self.first[..colon])
    }

    /// Returns true if the field name equals `name`, ignoring ASCII case.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name()
            .is_some_and(|found| found.eq_ignore_ascii_case(name.as_bytes()))
    }

    /// Value text on the start line: after the colon and at most one space
    /// or tab, terminator included.
    fn first_value(&self) -> &[u8] {
        let Some(colon) = self.first.iter().position(|byte| *byte == b':') else {
            return &[];
        };
        let rest = &self.first[colon + 1..];
        match rest.first() {
            Some(b' ' | b'\t') => &rest[1..],
            _ => rest,
        }
    }

    /// The value with line breaks removed (RFC 5322 unfolding).
    #[must_use]
    pub fn unfolded_value(&self) -> Vec<u8> {
        let mut value = strip_terminator(self.first_value()).to_vec();
        for line in &self.continuation {
            value.extend_from_slice(strip_terminator(line));
        }
        value
    }

    /// Total number of physical lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        1 + self.continuation.len()
    }

    fn ensure_terminated(&mut self, line_ending: &[u8]) {
        let last = self.continuation.last_mut().unwrap_or(&mut self.first);
        if !last.ends_with(LF) {
            last.extend_from_slice(line_ending);
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.first);
        for line in &self.continuation {
            out.extend_from_slice(line);
        }
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(LF).unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Removes the span from the first `<` to the last `>`, if any.
fn strip_angle_address(value: &[u8]) -> Vec<u8> {
    let open = value.iter().position(|byte| *byte == b'<');
    let close = value.iter().rposition(|byte| *byte == b'>');
    match (open, close) {
        (Some(open), Some(close)) if open < close => {
            let mut stripped = value[..open].to_vec();
            stripped.extend_from_slice(&value[close + 1..]);
            stripped
        }
        _ => value.to_vec(),
    }
}

/// Outcome of the `Reply-To` pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTo {
    /// The message already had a `Reply-To` field.
    AlreadyPresent,
    /// A `Reply-To` field was appended carrying this (unfolded) value.
    Added(String),
    /// No `From` field to copy from.
    MissingFrom,
}

/// Settings for [`rewrite_message`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteOptions {
    /// Address placed in every rewritten `From` field.
    pub noreply_address: String,
    /// Fixed value for every `To` field.
    pub to_override: Option<String>,
    /// Text prepended to every `Subject` value.
    pub subject_prefix: Option<String>,
}

/// What the rewrite changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// Result of the `Reply-To` pass.
    pub reply_to: ReplyTo,
    /// Number of `Subject` fields prefixed.
    pub subjects_prefixed: usize,
    /// Number of `From` fields rewritten.
    pub from_rewritten: usize,
    /// Number of `To` fields overridden.
    pub to_rewritten: usize,
    /// Number of `Return-Path`, `Sender` and `Message-ID` fields removed.
    pub identity_removed: usize,
    /// Number of `DKIM-Signature` fields removed.
    pub dkim_removed: usize,
    /// Whether the header segment was empty.
    pub header_empty: bool,
}

/// A rewritten message with its report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenMessage {
    /// Rewritten header followed by the original body.
    pub message: Vec<u8>,
    /// What changed.
    pub report: RewriteReport,
}

/// A parsed header segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    fields: Vec<HeaderField>,
    line_ending: &'static [u8],
}

impl HeaderBlock {
    /// Scans a header segment into fields.
    #[must_use]
    pub fn parse(segment: &[u8]) -> Self {
        let mut fields: Vec<HeaderField> = Vec::new();
        let mut line_ending = CRLF;

        for (index, line) in segment.split_inclusive(|byte| *byte == b'\n').enumerate() {
            if index == 0 && line.ends_with(LF) && !line.ends_with(CRLF) {
                line_ending = LF;
            }
            if classify(line) == LineKind::Continuation {
                if let Some(field) = fields.last_mut() {
                    field.continuation.push(line.to_vec());
                    continue;
                }
            }
            fields.push(HeaderField {
                first: line.to_vec(),
                continuation: Vec::new(),
            });
        }

        Self {
            fields,
            line_ending,
        }
    }

    /// Returns the fields in order.
    #[must_use]
    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    /// Returns the first field named `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&HeaderField> {
        self.fields.iter().find(|field| field.is(name))
    }

    /// Returns true if any field is named `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Serializes the fields back into a header segment.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for field in &self.fields {
            field.write_to(&mut out);
        }
        out
    }

    /// Applies every rewrite pass in order.
    pub fn apply(&mut self, options: &RewriteOptions) -> RewriteReport {
        let header_empty = self.fields.is_empty();
        let reply_to = self.add_reply_to();
        let subjects_prefixed = options
            .subject_prefix
            .as_deref()
            .map_or(0, |prefix| self.prefix_subjects(prefix));
        let from_rewritten = self.rewrite_from(&options.noreply_address);
        let to_rewritten = options
            .to_override
            .as_deref()
            .map_or(0, |to| self.override_to(to));
        let identity_removed = self.remove(&["Return-Path", "Sender", "Message-ID"]);
        let dkim_removed = self.remove(&["DKIM-Signature"]);

        RewriteReport {
            reply_to,
            subjects_prefixed,
            from_rewritten,
            to_rewritten,
            identity_removed,
            dkim_removed,
            header_empty,
        }
    }

    fn add_reply_to(&mut self) -> ReplyTo {
        if self.contains("Reply-To") {
            return ReplyTo::AlreadyPresent;
        }
        let Some(from) = self.find("From") else {
            return ReplyTo::MissingFrom;
        };

        let mut first = b"Reply-To: ".to_vec();
        first.extend_from_slice(from.first_value());
        let mut reply_to = HeaderField {
            first,
            continuation: from.continuation.clone(),
        };
        reply_to.ensure_terminated(self.line_ending);
        let shown = String::from_utf8_lossy(&reply_to.unfolded_value()).trim().to_string();

        let line_ending = self.line_ending;
        if let Some(last) = self.fields.last_mut() {
            last.ensure_terminated(line_ending);
        }
        self.fields.push(reply_to);
        ReplyTo::Added(shown)
    }

    fn prefix_subjects(&mut self, prefix: &str) -> usize {
        let mut count = 0;
        for field in self.fields.iter_mut().filter(|field| field.is("Subject")) {
            let mut first = b"Subject: ".to_vec();
            first.extend_from_slice(prefix.as_bytes());
            first.extend_from_slice(field.first_value());
            field.first = first;
            count += 1;
        }
        count
    }

    fn rewrite_from(&mut self, noreply_address: &str) -> usize {
        let line_ending = self.line_ending;
        let mut count = 0;
        for field in self.fields.iter_mut().filter(|field| field.is("From")) {
            let unfolded = field.unfolded_value();
            let stripped = strip_angle_address(&unfolded);
            let name = stripped.trim_ascii();

            let mut value = Vec::with_capacity(name.len() + noreply_address.len() + 3);
            if !name.is_empty() {
                value.extend_from_slice(name);
                value.push(b' ');
            }
            value.push(b'<');
            value.extend_from_slice(noreply_address.as_bytes());
            value.push(b'>');

            *field = HeaderField::single("From", &value, line_ending);
            count += 1;
        }
        count
    }

    fn override_to(&mut self, to: &str) -> usize {
        let line_ending = self.line_ending;
        let mut count = 0;
        for field in self.fields.iter_mut().filter(|field| field.is("To")) {
            *field = HeaderField::single("To", to.as_bytes(), line_ending);
            count += 1;
        }
        count
    }

    fn remove(&mut self, names: &[&str]) -> usize {
        let before = self.fields.len();
        self.fields
            .retain(|field| !names.iter().any(|name| field.is(name)));
        before - self.fields.len()
    }
}

/// Rewrites a raw message for forwarding.
///
/// The header/body split happens once; the body bytes are copied unchanged.
#[must_use]
pub fn rewrite_message(raw: &[u8], options: &RewriteOptions) -> RewrittenMessage {
    let (header, body) = split_message(raw);
    let mut block = HeaderBlock::parse(header);
    let report = block.apply(options);

    let mut message = block.to_bytes();
    message.extend_from_slice(body);

    RewrittenMessage { message, report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options() -> RewriteOptions {
        RewriteOptions {
            noreply_address: "noreply@example.com".to_string(),
            to_override: None,
            subject_prefix: None,
        }
    }

    fn rewrite(raw: &str, options: &RewriteOptions) -> (String, RewriteReport) {
        let rewritten = rewrite_message(raw.as_bytes(), options);
        (String::from_utf8(rewritten.message).unwrap(), rewritten.report)
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(b"From: a@b.com\r\n"), LineKind::FieldStart);
        assert_eq!(classify(b"\t continued\r\n"), LineKind::Continuation);
        assert_eq!(classify(b" \t\r\n"), LineKind::Blank);
        assert_eq!(classify(b"\r\n"), LineKind::Blank);
    }

    #[test]
    fn test_split_message() {
        let (header, body) = split_message(b"Subject: hi\r\nTo: a@b.com\r\n\r\nbody\r\n\r\nmore");
        assert_eq!(header, b"Subject: hi\r\nTo: a@b.com\r\n");
        assert_eq!(body, b"\r\nbody\r\n\r\nmore");
    }

    #[test]
    fn test_split_whitespace_only_line_is_boundary() {
        let (header, body) = split_message(b"Subject: hi\n  \nbody");
        assert_eq!(header, b"Subject: hi\n");
        assert_eq!(body, b"  \nbody");
    }

    #[test]
    fn test_split_without_blank_line() {
        let (header, body) = split_message(b"Subject: hi\r\nTo: a@b.com");
        assert_eq!(header, b"Subject: hi\r\nTo: a@b.com");
        assert!(body.is_empty());
    }

    #[test]
    fn test_split_leading_blank_line() {
        let (header, body) = split_message(b"\r\nFrom: a@b.com\r\n");
        assert!(header.is_empty());
        assert_eq!(body, b"\r\nFrom: a@b.com\r\n");
    }

    #[test]
    fn test_from_and_reply_to_round_trip() {
        let (message, report) = rewrite("From: A <a@b.com>\r\nTo: x@y.com\r\n\r\nhello", &options());

        assert_eq!(
            message,
            "From: A <noreply@example.com>\r\nTo: x@y.com\r\nReply-To: A <a@b.com>\r\n\r\nhello"
        );
        assert_eq!(report.reply_to, ReplyTo::Added("A <a@b.com>".to_string()));
        assert_eq!(report.from_rewritten, 1);
        assert_eq!(report.to_rewritten, 0);
        assert!(message.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn test_existing_reply_to_is_kept() {
        let (message, report) = rewrite(
            "reply-to: r@b.com\r\nFrom: a@b.com\r\n\r\nbody",
            &options(),
        );

        assert_eq!(report.reply_to, ReplyTo::AlreadyPresent);
        assert_eq!(message.to_ascii_lowercase().matches("reply-to:").count(), 1);
        assert!(message.starts_with("reply-to: r@b.com\r\nFrom: a@b.com <noreply@example.com>\r\n"));
    }

    #[test]
    fn test_missing_from_adds_no_reply_to() {
        let (message, report) = rewrite("Subject: hi\r\n\r\nbody", &options());

        assert_eq!(report.reply_to, ReplyTo::MissingFrom);
        assert_eq!(report.from_rewritten, 0);
        assert_eq!(message, "Subject: hi\r\n\r\nbody");
    }

    #[test]
    fn test_folded_from() {
        let raw = "From: \"Very Long Name\"\r\n <a@b.com>\r\nSubject: x\r\n\r\nbody";
        let (message, report) = rewrite(raw, &options());

        assert_eq!(
            message,
            "From: \"Very Long Name\" <noreply@example.com>\r\nSubject: x\r\n\
             Reply-To: \"Very Long Name\"\r\n <a@b.com>\r\n\r\nbody"
        );
        assert_eq!(
            report.reply_to,
            ReplyTo::Added("\"Very Long Name\" <a@b.com>".to_string())
        );
    }

    #[test]
    fn test_from_without_display_name() {
        let (message, _) = rewrite("From: <a@b.com>\r\n\r\nbody", &options());
        assert!(message.starts_with("From: <noreply@example.com>\r\n"));

        let (message, _) = rewrite("FROM: a@b.com\r\n\r\nbody", &options());
        assert!(message.starts_with("From: a@b.com <noreply@example.com>\r\n"));
    }

    #[test]
    fn test_to_override() {
        let mut options = options();
        options.to_override = Some("team@example.com".to_string());
        let (message, report) = rewrite(
            "From: a@b.com\r\nTo: one@x.com,\r\n\ttwo@x.com\r\nReply-To: r@b.com\r\n\r\nbody",
            &options,
        );

        assert_eq!(report.to_rewritten, 1);
        assert_eq!(
            message,
            "From: a@b.com <noreply@example.com>\r\nTo: team@example.com\r\nReply-To: r@b.com\r\n\r\nbody"
        );
    }

    #[test]
    fn test_subject_prefix() {
        let mut options = options();
        options.subject_prefix = Some("[fwd] ".to_string());
        let (message, report) = rewrite("Subject: Hello\r\n there\r\n\r\nbody", &options);

        assert_eq!(report.subjects_prefixed, 1);
        assert_eq!(message, "Subject: [fwd] Hello\r\n there\r\n\r\nbody");
    }

    #[test]
    fn test_identity_headers_removed() {
        let raw = "Return-Path: <bounce@b.com>\r\nFrom: a@b.com\r\nSender: s@b.com\r\n\
                   Message-ID: <id@b.com>\r\n  continued-id\r\nX-Sender: keep@b.com\r\n\r\nbody";
        let (message, report) = rewrite(raw, &options());

        assert_eq!(report.identity_removed, 3);
        assert_eq!(
            message,
            "From: a@b.com <noreply@example.com>\r\nX-Sender: keep@b.com\r\nReply-To: a@b.com\r\n\r\nbody"
        );
    }

    #[test]
    fn test_folded_dkim_signature_removed_entirely() {
        let raw = "DKIM-Signature: v=1; a=rsa-sha256; d=b.com;\r\n\
                   \ts=sel; h=from:to;\r\n\
                   \tb=abcdef\r\n\
                   Subject: hi\r\n\r\nbody";
        let (message, report) = rewrite(raw, &options());

        assert_eq!(report.dkim_removed, 1);
        assert_eq!(message, "Subject: hi\r\n\r\nbody");
    }

    #[test]
    fn test_lf_line_endings_are_preserved() {
        let (message, _) = rewrite("From: A <a@b.com>\nTo: x@y.com\n\nhello", &options());

        assert_eq!(
            message,
            "From: A <noreply@example.com>\nTo: x@y.com\nReply-To: A <a@b.com>\n\nhello"
        );
    }

    #[test]
    fn test_message_without_body_or_final_newline() {
        let (message, _) = rewrite("From: a@b.com", &options());

        assert_eq!(message, "From: a@b.com <noreply@example.com>\r\nReply-To: a@b.com\r\n");
    }

    #[test]
    fn test_empty_header_passes_body_through() {
        let rewritten = rewrite_message(b"\r\nFrom: a@b.com\r\n", &options());

        assert!(rewritten.report.header_empty);
        assert_eq!(rewritten.report.reply_to, ReplyTo::MissingFrom);
        assert_eq!(rewritten.message, b"\r\nFrom: a@b.com\r\n");
    }

    #[test]
    fn test_body_bytes_are_untouched() {
        let mut raw = b"From: a@b.com\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe, b'\r', b'\n', b'F', b'r', b'o', b'm', b':']);
        let rewritten = rewrite_message(&raw, &options());

        assert!(rewritten.message.ends_with(&[0xff, 0xfe, b'\r', b'\n', b'F', b'r', b'o', b'm', b':']));
    }

    #[test]
    fn test_rewrite_is_deterministic() {
        let raw = b"DKIM-Signature: x\r\n y\r\nFrom: A <a@b.com>\r\nTo: t@b.com\r\n\r\nbody";
        assert_eq!(rewrite_message(raw, &options()), rewrite_message(raw, &options()));
    }

    #[test]
    fn test_header_block_lookup() {
        let block = HeaderBlock::parse(b"  orphan\r\nFrom: a@b.com\r\n folded\r\nFromage: no\r\n");

        assert_eq!(block.fields().len(), 3);
        assert!(block.fields()[0].name().is_none());
        assert_eq!(block.find("from").map(HeaderField::line_count), Some(2));
        assert!(!block.contains("Fromage:"));
        assert!(block.contains("FROMAGE"));
        assert_eq!(
            block.to_bytes(),
            b"  orphan\r\nFrom: a@b.com\r\n folded\r\nFromage: no\r\n".to_vec()
        );
    }
}
