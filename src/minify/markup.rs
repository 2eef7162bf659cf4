use crate::error::TransformError;
use crate::transform::Minifier;
use bytes::{BufMut, BytesMut};
use std::mem;

const COMMENT_OPEN: &[u8] = b"!--";
const CDATA_OPEN: &[u8] = b"![CDATA[";
const MAX_TAG_NAME: usize = 16;
const MAX_ATTR_TOKEN: usize = 16;
const XML_SPACE_ATTR: &[u8] = b"xml:space=";
const PRESERVE: &[u8] = b"preserve";

/// HTML elements whose content is copied verbatim.
const RAW_ELEMENTS: &[&[u8]] = &[b"pre", b"textarea", b"script", b"style"];

/// SVG elements whose whitespace between child tags is rendered.
const TEXT_ELEMENTS: &[&[u8]] = &[b"text", b"tspan", b"textpath"];

/// Markup flavour handled by [`MarkupMinifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dialect {
    /// Whitespace runs collapse to one space; raw text elements are preserved.
    Html,
    /// Like `Html`, but whitespace-only runs between tags are dropped outside
    /// SVG text elements and unterminated constructs are errors. Elements
    /// carrying `xml:space="preserve"` are copied verbatim.
    Xml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    /// After `<`, deciding between a tag, a comment and a CDATA section.
    Open,
    Tag,
    Quoted(u8),
    Comment,
    CData,
    /// Inside an element copied verbatim up to its closing tag.
    Raw,
}

/// Streaming whitespace and comment compactor for HTML and XML.
///
/// Works one byte at a time so chunk boundaries can fall anywhere. The only
/// state carried between chunks is a few flags and at most eight bytes of
/// lookahead after a `<`.
#[derive(Debug)]
pub(crate) struct MarkupMinifier {
    dialect: Dialect,
    state: State,
    lookahead: Vec<u8>,
    pending_space: bool,
    /// Nothing has been written yet.
    at_start: bool,
    /// The current text run holds something other than whitespace.
    text_has_content: bool,
    tag_name: Vec<u8>,
    name_done: bool,
    closing: bool,
    last_tag_byte: u8,
    /// Current attribute token of the tag being read.
    attr: Vec<u8>,
    /// The quoted value being read belongs to `xml:space`.
    in_xml_space: bool,
    /// The tag being read carries `xml:space="preserve"`.
    preserve: bool,
    /// Open SVG text elements around the current position.
    text_depth: usize,
    raw_name: Vec<u8>,
    /// Progress through the terminator of a comment, CDATA section or raw element.
    matched: usize,
}

impl MarkupMinifier {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: State::Text,
            lookahead: Vec::with_capacity(CDATA_OPEN.len()),
            pending_space: false,
            at_start: true,
            text_has_content: false,
            tag_name: Vec::with_capacity(MAX_TAG_NAME),
            name_done: false,
            closing: false,
            last_tag_byte: 0,
            attr: Vec::with_capacity(MAX_ATTR_TOKEN),
            in_xml_space: false,
            preserve: false,
            text_depth: 0,
            raw_name: Vec::with_capacity(MAX_TAG_NAME),
            matched: 0,
        }
    }

    fn byte(&mut self, b: u8, out: &mut BytesMut) {
        match self.state {
            State::Text => self.text_byte(b, out),
            State::Open => self.open_byte(b, out),
            State::Tag => self.tag_byte(b, out),
            State::Quoted(quote) => {
                out.put_u8(b);
                if b == quote {
                    self.state = State::Tag;
                    if mem::take(&mut self.in_xml_space) && self.attr == PRESERVE {
                        self.preserve = true;
                    }
                    self.attr.clear();
                } else if self.in_xml_space && self.attr.len() < MAX_ATTR_TOKEN {
                    self.attr.push(b);
                }
            }
            State::Comment => match b {
                b'-' => self.matched = (self.matched + 1).min(2),
                b'>' if self.matched == 2 => self.state = State::Text,
                _ => self.matched = 0,
            },
            State::CData => {
                out.put_u8(b);
                match b {
                    b']' => self.matched = (self.matched + 1).min(2),
                    b'>' if self.matched == 2 => {
                        self.state = State::Text;
                        self.text_has_content = true;
                    }
                    _ => self.matched = 0,
                }
            }
            State::Raw => self.raw_byte(b, out),
        }
    }

    fn text_byte(&mut self, b: u8, out: &mut BytesMut) {
        if is_space(b) {
            self.pending_space = true;
        } else if b == b'<' {
            // The space before `<` is settled once we know what follows it.
            self.state = State::Open;
            self.lookahead.clear();
        } else {
            self.flush_text_space(out);
            out.put_u8(b);
            self.at_start = false;
            self.text_has_content = true;
        }
    }

    fn open_byte(&mut self, b: u8, out: &mut BytesMut) {
        self.lookahead.push(b);

        if COMMENT_OPEN.starts_with(&self.lookahead) {
            if self.lookahead.len() == COMMENT_OPEN.len() {
                // Comments vanish, so surrounding whitespace runs merge.
                self.state = State::Comment;
                self.matched = 0;
            }
            return;
        }

        if CDATA_OPEN.starts_with(&self.lookahead) {
            if self.lookahead.len() == CDATA_OPEN.len() {
                self.flush_tag_space(out);
                out.put_u8(b'<');
                out.extend_from_slice(CDATA_OPEN);
                self.at_start = false;
                self.state = State::CData;
                self.matched = 0;
            }
            return;
        }

        let pending = mem::take(&mut self.lookahead);
        let first = pending[0];

        if first.is_ascii_alphabetic() || matches!(first, b'/' | b'!' | b'?') {
            self.flush_tag_space(out);
            out.put_u8(b'<');
            self.at_start = false;
            self.state = State::Tag;
            self.tag_name.clear();
            self.name_done = false;
            self.closing = false;
            self.attr.clear();
            self.in_xml_space = false;
            self.preserve = false;
            for &b in &pending {
                self.tag_byte(b, out);
            }
        } else {
            // A lone `<` in text, as in `a < b`.
            self.flush_text_space(out);
            out.put_u8(b'<');
            self.at_start = false;
            self.text_has_content = true;
            self.state = State::Text;
            for &b in &pending {
                self.text_byte(b, out);
            }
        }

        self.lookahead = pending;
        self.lookahead.clear();
    }

    fn tag_byte(&mut self, b: u8, out: &mut BytesMut) {
        if is_space(b) {
            self.pending_space = true;
            self.name_done = true;
            return;
        }

        if b == b'>' {
            self.pending_space = false;
            out.put_u8(b'>');
            self.end_tag();
            return;
        }

        let after_space = mem::take(&mut self.pending_space);
        if after_space {
            out.put_u8(b' ');
        }

        if b == b'"' || b == b'\'' {
            self.name_done = true;
            self.in_xml_space = self.attr == XML_SPACE_ATTR;
            self.attr.clear();
            self.state = State::Quoted(b);
        } else if !self.name_done {
            if b == b'/' && self.tag_name.is_empty() && !self.closing {
                self.closing = true;
            } else if b.is_ascii_alphanumeric() || b == b'-' || b == b':' {
                if self.tag_name.len() < MAX_TAG_NAME {
                    self.tag_name.push(b.to_ascii_lowercase());
                }
            } else {
                self.name_done = true;
            }
        } else {
            // `name = "value"` may have spaces around the `=`.
            if after_space && b != b'=' && !self.attr.ends_with(b"=") {
                self.attr.clear();
            }
            if self.attr.len() < MAX_ATTR_TOKEN {
                self.attr.push(b);
            }
        }

        self.last_tag_byte = b;
        out.put_u8(b);
    }

    fn end_tag(&mut self) {
        self.state = State::Text;
        self.text_has_content = false;
        let preserve = mem::take(&mut self.preserve);
        let is_text_element = TEXT_ELEMENTS.contains(&self.tag_name.as_slice());

        if self.closing {
            if self.dialect == Dialect::Xml && is_text_element {
                self.text_depth = self.text_depth.saturating_sub(1);
            }
            return;
        }
        if self.last_tag_byte == b'/' {
            return;
        }

        let verbatim = match self.dialect {
            Dialect::Html => RAW_ELEMENTS.contains(&self.tag_name.as_slice()),
            Dialect::Xml => {
                if is_text_element {
                    self.text_depth += 1;
                }
                preserve
            }
        };

        if verbatim && !self.tag_name.is_empty() {
            self.raw_name.clear();
            self.raw_name.extend_from_slice(&self.tag_name);
            self.state = State::Raw;
            self.matched = 0;
        }
    }

    fn raw_byte(&mut self, b: u8, out: &mut BytesMut) {
        out.put_u8(b);

        let expected = match self.matched {
            0 => b'<',
            1 => b'/',
            n => self.raw_name[n - 2],
        };

        if b.to_ascii_lowercase() != expected {
            self.matched = usize::from(b == b'<');
            return;
        }

        self.matched += 1;
        if self.matched == self.raw_name.len() + 2 {
            // `</name` is already written; the rest of the closing tag is a tag.
            self.state = State::Tag;
            self.tag_name.clear();
            self.tag_name.extend_from_slice(&self.raw_name);
            self.name_done = false;
            self.closing = true;
            self.preserve = false;
            self.last_tag_byte = b;
        }
    }

    fn flush_text_space(&mut self, out: &mut BytesMut) {
        if mem::take(&mut self.pending_space) && !self.at_start {
            out.put_u8(b' ');
        }
    }

    fn flush_tag_space(&mut self, out: &mut BytesMut) {
        if !mem::take(&mut self.pending_space) || self.at_start {
            return;
        }
        if self.dialect == Dialect::Html || self.text_has_content || self.text_depth > 0 {
            out.put_u8(b' ');
        }
    }

    fn unterminated(&self, context: &'static str) -> Result<(), TransformError> {
        match self.dialect {
            Dialect::Html => Ok(()),
            Dialect::Xml => Err(TransformError::UnexpectedEof { context }),
        }
    }
}

impl Minifier for MarkupMinifier {
    fn write(&mut self, input: &[u8], output: &mut BytesMut) -> Result<(), TransformError> {
        output.reserve(input.len());
        for &b in input {
            self.byte(b, output);
        }
        Ok(())
    }

    fn finish(&mut self, output: &mut BytesMut) -> Result<(), TransformError> {
        self.pending_space = false;
        match self.state {
            State::Text | State::Raw => Ok(()),
            State::Open => {
                self.unterminated("tag")?;
                output.put_u8(b'<');
                output.extend_from_slice(&self.lookahead);
                Ok(())
            }
            State::Tag | State::Quoted(_) => self.unterminated("tag"),
            State::Comment => self.unterminated("comment"),
            State::CData => self.unterminated("CDATA section"),
        }
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minify(dialect: Dialect, input: &str) -> Result<String, TransformError> {
        minify_chunked(dialect, input, input.len().max(1))
    }

    fn minify_chunked(dialect: Dialect, input: &str, size: usize) -> Result<String, TransformError> {
        let mut minifier = MarkupMinifier::new(dialect);
        let mut out = BytesMut::new();
        for chunk in input.as_bytes().chunks(size) {
            minifier.write(chunk, &mut out)?;
        }
        minifier.finish(&mut out)?;
        Ok(String::from_utf8(out.to_vec()).unwrap())
    }

    fn html(input: &str) -> String {
        minify(Dialect::Html, input).unwrap()
    }

    fn xml(input: &str) -> String {
        minify(Dialect::Xml, input).unwrap()
    }

    #[test]
    fn test_collapses_text_whitespace() {
        assert_eq!(html("<p>  hi  </p>"), "<p> hi </p>");
        assert_eq!(html("\n\n<p>a\n\n\tb</p>\n"), "<p>a b</p>");
    }

    #[test]
    fn test_collapses_tag_whitespace() {
        assert_eq!(
            html("<a   href=\"x  y\"\n class='c' >t</a >"),
            "<a href=\"x  y\" class='c'>t</a>"
        );
        assert_eq!(html("<br />"), "<br />");
    }

    #[test]
    fn test_strips_comments() {
        assert_eq!(html("<p>a <!-- note --> b</p>"), "<p>a b</p>");
        assert_eq!(html("<!-- a -- b --->x"), "x");
    }

    #[test]
    fn test_keeps_doctype_and_processing_instruction() {
        assert_eq!(
            html("<!DOCTYPE html>\n<html>\n</html>"),
            "<!DOCTYPE html> <html> </html>"
        );
        assert_eq!(
            xml("<?xml version=\"1.0\"?>\n<svg/>"),
            "<?xml version=\"1.0\"?><svg/>"
        );
    }

    #[test]
    fn test_raw_elements_preserved() {
        let input = "<pre>  a\n   b  </pre>  <script> if (a < b)  {} </script>";
        assert_eq!(
            html(input),
            "<pre>  a\n   b  </pre> <script> if (a < b)  {} </script>"
        );
        assert_eq!(
            html("<STYLE>  a  </Style >  x"),
            "<STYLE>  a  </Style> x"
        );
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        assert_eq!(html("<p>1  <  2</p>"), "<p>1 < 2</p>");
    }

    #[test]
    fn test_xml_drops_whitespace_between_tags() {
        let input = "<svg>\n  <g>\n    <path d=\"M 0 0\"/>\n  </g>\n  <text> Hi  there </text>\n</svg>\n";
        assert_eq!(
            xml(input),
            "<svg><g><path d=\"M 0 0\"/></g><text> Hi there </text></svg>"
        );
    }

    #[test]
    fn test_xml_keeps_space_between_text_spans() {
        let input = "<svg>\n  <text>\n    <tspan>Hello</tspan> <tspan>world</tspan>\n  </text>\n</svg>";
        let expected = "<svg><text> <tspan>Hello</tspan> <tspan>world</tspan> </text></svg>";
        for size in 1..12 {
            assert_eq!(minify_chunked(Dialect::Xml, input, size).unwrap(), expected);
        }
        assert_eq!(
            xml("<svg><text><tspan>a</tspan><tspan>b</tspan></text> <g/></svg>"),
            "<svg><text><tspan>a</tspan><tspan>b</tspan></text><g/></svg>"
        );
    }

    #[test]
    fn test_xml_space_preserve_copied_verbatim() {
        let input = "<svg>\n <text xml:space=\"preserve\">a    b\n  c</text>\n <text x=\"1\">a    b</text>\n</svg>";
        let expected =
            "<svg><text xml:space=\"preserve\">a    b\n  c</text><text x=\"1\">a b</text></svg>";
        for size in 1..12 {
            assert_eq!(minify_chunked(Dialect::Xml, input, size).unwrap(), expected);
        }
        assert_eq!(
            xml("<g  xml:space = 'preserve' >  x  </g >  <g/>"),
            "<g xml:space = 'preserve'>  x  </g><g/>"
        );
        assert_eq!(
            xml("<text xml:space=\"default\">a    b</text>"),
            "<text xml:space=\"default\">a b</text>"
        );
    }

    #[test]
    fn test_xml_cdata_preserved() {
        assert_eq!(
            xml("<s>  <![CDATA[ a  ]] > b ]]>  </s>"),
            "<s><![CDATA[ a  ]] > b ]]> </s>"
        );
    }

    #[test]
    fn test_xml_unterminated_is_error() {
        assert!(matches!(
            minify(Dialect::Xml, "<svg><!-- open"),
            Err(TransformError::UnexpectedEof { context: "comment" })
        ));
        assert!(matches!(
            minify(Dialect::Xml, "<svg width=\"1"),
            Err(TransformError::UnexpectedEof { context: "tag" })
        ));
    }

    #[test]
    fn test_html_unterminated_is_lenient() {
        assert_eq!(html("<p>a <!-- open"), "<p>a");
        assert_eq!(html("a <!"), "a<!");
    }

    #[test]
    fn test_chunk_boundaries_do_not_matter() {
        let input = "<!doctype html>\n<p class = \"a\">  x  <!-- c -->  y </p>\n<pre> k </pre>\n<![CDATA[ z ]]>";
        let expected = html(input);
        for size in 1..12 {
            assert_eq!(minify_chunked(Dialect::Html, input, size).unwrap(), expected);
        }
    }

    #[test]
    fn test_second_pass_does_not_grow() {
        let inputs = [
            "<p>  hi  </p>",
            "<div>\n  <p>a <!-- x --> b</p>\n  <pre> x </pre>\n</div>\n",
            "<svg>\n <g> <rect x='1' /> </g>\n</svg>",
        ];
        for input in inputs {
            for dialect in [Dialect::Html, Dialect::Xml] {
                let once = minify(dialect, input).unwrap();
                let twice = minify(dialect, &once).unwrap();
                assert!(twice.len() <= once.len());
                assert_eq!(twice, once);
            }
        }
    }
}
