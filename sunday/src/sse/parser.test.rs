use super::*;
use pretty_assertions::assert_eq;

fn parse_all(input: &[u8]) -> Vec<EventInfo> {
    EventParser::new().process(input).events
}

#[test]
fn test_single_event() {
    let events = parse_all(b"event: hello\nid: 12345\ndata: Hello World!\n\n");
    assert_eq!(
        events,
        vec![EventInfo {
            event: Some("hello".into()),
            id: Some("12345".into()),
            retry: None,
            data: Some("Hello World!".into()),
        }]
    );
}

#[test]
fn test_line_terminators_are_interchangeable() {
    let expected = parse_all(b"event: hello\nid: 12345\ndata: Hello World!\n\n");
    let cr = parse_all(b"event: hello\rid: 12345\rdata: Hello World!\r\r");
    let crlf = parse_all(b"event: hello\r\nid: 12345\r\ndata: Hello World!\r\n\r\n");
    let mixed = parse_all(b"event: hello\rid: 12345\r\ndata: Hello World!\n\r");
    assert_eq!(cr, expected);
    assert_eq!(crlf, expected);
    assert_eq!(mixed, expected);
}

#[test]
fn test_chunked_input_matches_unchunked() {
    let input: &[u8] = b"event: hello\r\nid: 12345\r\ndata: Hello\ndata: World!\r\n\r\nretry: 500\n\n";
    let expected = parse_all(input);
    assert_eq!(expected.len(), 2);

    for chunk_size in 1..input.len() {
        let mut parser = EventParser::new();
        let mut events = Vec::new();
        for chunk in input.chunks(chunk_size) {
            events.extend(parser.process(chunk).events);
        }
        assert_eq!(events, expected, "chunk size {chunk_size}");
    }
}

#[test]
fn test_crlf_split_across_chunks() {
    let mut parser = EventParser::new();
    let mut events = Vec::new();
    events.extend(parser.process(b"data: a\r").events);
    events.extend(parser.process(b"\n\r\n").events);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data.as_deref(), Some("a"));
}

#[test]
fn test_multiple_data_lines_join_with_newline() {
    let events = parse_all(b"data: line one\ndata: line two\n\n");
    assert_eq!(events[0].data.as_deref(), Some("line one\nline two"));
}

#[test]
fn test_data_trailing_newline_trimmed_once() {
    let events = parse_all(b"data: a\ndata:\n\n");
    // Second empty data field contributes a bare newline that survives.
    assert_eq!(events[0].data.as_deref(), Some("a\n"));
}

#[test]
fn test_value_leading_space_stripped_once() {
    let events = parse_all(b"data:  two spaces\n\n");
    assert_eq!(events[0].data.as_deref(), Some(" two spaces"));

    let events = parse_all(b"data:no space\n\n");
    assert_eq!(events[0].data.as_deref(), Some("no space"));
}

#[test]
fn test_line_without_colon_is_field_with_empty_value() {
    let events = parse_all(b"data\n\n");
    assert_eq!(events[0].data.as_deref(), Some(""));
}

#[test]
fn test_empty_field_values_dispatch() {
    let events = parse_all(b"event:\n\n");
    assert_eq!(
        events,
        vec![EventInfo {
            event: Some("".into()),
            ..EventInfo::default()
        }]
    );
}

#[test]
fn test_empty_lines_without_fields_do_not_dispatch() {
    assert_eq!(parse_all(b"\n\n\n"), vec![]);
}

#[test]
fn test_comments_are_counted_not_dispatched() {
    let mut parser = EventParser::new();
    let parsed = parser.process(b": ping\n: another\ndata: x\n\n");
    assert_eq!(parsed.comments, 2);
    assert_eq!(parsed.events.len(), 1);
}

#[test]
fn test_id_with_nul_byte_is_ignored() {
    let events = parse_all(b"id: a\x00c\ndata: x\n\n");
    assert_eq!(events[0].id, None);
    assert_eq!(events[0].data.as_deref(), Some("x"));
}

#[test]
fn test_retry_is_kept_raw() {
    let events = parse_all(b"retry: 123456789\n\nretry: abc\n\n");
    assert_eq!(events[0].retry.as_deref(), Some("123456789"));
    assert_eq!(events[1].retry.as_deref(), Some("abc"));
}

#[test]
fn test_unknown_fields_are_ignored() {
    let events = parse_all(b"custom: value\ndata: x\n\n");
    assert_eq!(events[0].data.as_deref(), Some("x"));
    assert_eq!(events[0].event, None);
}

#[test]
fn test_incomplete_trailing_line_buffers() {
    let mut parser = EventParser::new();
    assert_eq!(parser.process(b"data: par").events, vec![]);
    let events = parser.process(b"tial\n\n").events;
    assert_eq!(events[0].data.as_deref(), Some("partial"));
}

#[test]
fn test_accumulator_resets_between_events() {
    let events = parse_all(b"event: one\ndata: 1\n\ndata: 2\n\n");
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event, None);
    assert_eq!(events[1].data.as_deref(), Some("2"));
}
