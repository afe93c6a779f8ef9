//! Parser for the OSM/IDF text format using nom combinators.
//!
//! A file is a sequence of objects, each of the form `Type, field, field, ... field;`, with
//! whitespace between tokens and `!` comments running to the end of the line. A comment directly
//! after a field delimiter (conventionally `!- Field Name`) is kept as that field's comment.
use super::IdfObject;
use anyhow::{Result, bail};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while1},
    character::complete::{char, multispace0, multispace1, not_line_ending, one_of, space0},
    combinator::{opt, recognize, value},
    multi::many0,
    sequence::preceded,
};

/// The raw contents of a parsed file
#[derive(Debug, Default)]
pub(super) struct ParsedFile {
    /// The comment lines at the top of the file
    pub header: Vec<String>,
    /// The objects, in file order
    pub objects: Vec<IdfObject>,
}

/// A field value with its delimiter and trailing comment
struct RawField<'a> {
    value: &'a str,
    delimiter: char,
    comment: Option<&'a str>,
}

/// Parse whitespace, returning whether it contained a blank line
fn blank(input: &str) -> IResult<&str, bool> {
    let (input, ws) = multispace0(input)?;
    Ok((input, ws.matches('\n').count() > 1))
}

/// Parse a full comment line, including the `!`
fn comment_line(input: &str) -> IResult<&str, &str> {
    recognize((char('!'), not_line_ending)).parse(input)
}

/// Skip whitespace and whole-line comments between fields
fn gap(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, comment_line)))).parse(input)
}

/// Parse a comment on the same line as a delimiter, without the `!` and any `-` marker
fn trailing_comment(input: &str) -> IResult<&str, Option<&str>> {
    let (input, comment) =
        preceded(space0, opt(preceded(char('!'), not_line_ending))).parse(input)?;
    let comment = comment.map(|c| c.trim_start_matches('-').trim());

    Ok((input, comment))
}

/// Parse an object type name
fn type_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !matches!(c, ',' | ';' | '!') && !c.is_whitespace())(input)
}

/// Parse one field value and the delimiter after it
fn field(input: &str) -> IResult<&str, RawField<'_>> {
    let (input, _) = gap(input)?;
    let (input, raw) = take_till(|c| matches!(c, ',' | ';' | '!' | '\n' | '\r'))(input)?;
    // The delimiter may be on a later line
    let (input, _) = gap(input)?;
    let (input, delimiter) = one_of(",;")(input)?;
    let (input, comment) = trailing_comment(input)?;

    Ok((
        input,
        RawField {
            value: raw.trim(),
            delimiter,
            comment,
        },
    ))
}

/// Parse a complete object
fn idf_object(input: &str) -> IResult<&str, IdfObject> {
    let (input, name) = type_name(input)?;
    let (input, _) = space0(input)?;
    let (mut input, delimiter) = one_of(",;")(input)?;
    (input, _) = trailing_comment(input)?;

    let mut object = IdfObject::new(name);
    if delimiter == ';' {
        return Ok((input, object));
    }

    loop {
        let (rest, raw) = field(input)?;
        input = rest;

        let index = object.num_fields();
        object.set(index, raw.value);
        if let Some(comment) = raw.comment.filter(|c| !c.is_empty()) {
            object.set_field_comment(index, comment);
        }

        if raw.delimiter == ';' {
            return Ok((input, object));
        }
    }
}

/// The 1-based line number of the position `remaining` in `text`
fn line_number(text: &str, remaining: &str) -> usize {
    let offset = text.len() - remaining.len();
    text[..offset].matches('\n').count() + 1
}

/// Parse the contents of a model file.
///
/// Comment lines before the first object are treated as the file header if they are separated
/// from it by a blank line, otherwise they are attached to the first object.
pub(super) fn parse(text: &str) -> Result<ParsedFile> {
    let mut parsed = ParsedFile::default();
    let mut pending: Vec<String> = Vec::new();
    let mut input = text;

    loop {
        let (rest, had_blank_line) = blank(input).unwrap_or((input, false));
        if had_blank_line && parsed.objects.is_empty() && parsed.header.is_empty() {
            parsed.header.append(&mut pending);
        }
        input = rest;

        if input.is_empty() {
            break;
        }

        if let Ok((rest, comment)) = comment_line(input) {
            pending.push(comment.trim_end().to_string());
            input = rest;
            continue;
        }

        let line = line_number(text, input);
        let Ok((rest, mut object)) = idf_object(input) else {
            bail!("Malformed object starting on line {line}");
        };
        if !pending.is_empty() {
            object.set_comment(&pending.join("\n"));
            pending.clear();
        }
        parsed.objects.push(object);
        input = rest;
    }

    if parsed.objects.is_empty() {
        parsed.header.append(&mut pending);
    }

    Ok(parsed)
}

/// Parse objects until one of the given type is found, ignoring anything malformed after it
pub(super) fn find_first_object(text: &str, type_name: &str) -> Option<IdfObject> {
    let mut input = text;
    loop {
        input = gap(input).ok()?.0;
        if input.is_empty() {
            return None;
        }

        let (rest, object) = idf_object(input).ok()?;
        if object.is_type(type_name) {
            return Some(object);
        }
        input = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    const MODEL: &str = "! File header

! Comment for the version
OS:Version,
  {0f93d9e1-bdda-4e2a-829b-e4fff92527d0}, !- Handle
  3.0.1;                                  !- Version Identifier

OS:ThermalZone,
  {11111111-bdda-4e2a-829b-e4fff92527d0}, !- Handle
  Zone 1,                                 !- Name
  ,                                       !- Multiplier
  ;
";

    #[test]
    fn test_parse() {
        let parsed = parse(MODEL).unwrap();
        assert_eq!(parsed.header, ["! File header"]);
        assert_eq!(parsed.objects.len(), 2);

        let version = &parsed.objects[0];
        assert_eq!(version.type_name(), "OS:Version");
        assert_eq!(version.comment(), "! Comment for the version");
        assert_eq!(version.get(1), Some("3.0.1"));
        assert_eq!(version.field_comment(1), Some("Version Identifier"));

        let zone = &parsed.objects[1];
        assert_eq!(
            zone.fields(),
            ["{11111111-bdda-4e2a-829b-e4fff92527d0}", "Zone 1", "", ""]
        );
        assert_eq!(zone.field_comment(3), None);
    }

    #[test]
    fn test_parse_crlf() {
        let parsed = parse(&MODEL.replace('\n', "\r\n")).unwrap();
        assert_eq!(parsed.objects.len(), 2);
        assert_eq!(parsed.objects[1].get(1), Some("Zone 1"));
        assert_eq!(parsed.objects[0].field_comment(0), Some("Handle"));
    }

    #[test]
    fn test_parse_single_line() {
        let parsed = parse("OS:Node, {a}, Node 1 , , ;").unwrap();
        assert_eq!(parsed.objects[0].fields(), ["{a}", "Node 1", "", ""]);
    }

    #[test]
    fn test_parse_comment_between_fields() {
        let parsed = parse("OS:Node,\n  {a},\n! stray comment\n  Node 1;\n").unwrap();
        assert_eq!(parsed.objects[0].fields(), ["{a}", "Node 1"]);
    }

    #[test]
    fn test_parse_delimiter_on_next_line() {
        let text = "OS:Node,\n  {a},\n  Node 1\n  ;\n\n\
                    OS:Node,\n  {b}, !- Handle\n  Node 2 ! note\n  ;";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.objects.len(), 2);
        assert_eq!(parsed.objects[0].fields(), ["{a}", "Node 1"]);
        assert_eq!(parsed.objects[1].fields(), ["{b}", "Node 2"]);
    }

    #[test]
    fn test_parse_object_without_fields() {
        let parsed = parse("OS:Foo;\nOS:Bar, x;").unwrap();
        assert_eq!(parsed.objects[0].num_fields(), 0);
        assert_eq!(parsed.objects[1].fields(), ["x"]);
    }

    #[test]
    fn test_parse_comments_only() {
        let parsed = parse("! one\n! two\n").unwrap();
        assert_eq!(parsed.header, ["! one", "! two"]);
        assert!(parsed.objects.is_empty());
    }

    #[test]
    fn test_parse_unterminated() {
        let text = "OS:Node,\n  {a};\n\nOS:Node,\n  {b},\n  Node 2\n";
        assert_error!(parse(text), "Malformed object starting on line 4");
    }

    #[test]
    fn test_find_first_object() {
        let text = "OS:Version, {a}, 2.9.1;\nOS:Node, this is broken";
        let version = find_first_object(text, "os:version").unwrap();
        assert_eq!(version.get(1), Some("2.9.1"));
        assert!(find_first_object(text, "OS:ThermalZone").is_none());
    }
}
