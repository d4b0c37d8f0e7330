use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_canonical_round_trip() {
    let cases = [
        MediaType::json(),
        MediaType::cbor(),
        MediaType::plain(),
        MediaType::www_form_url_encoded(),
        MediaType::problem_json(),
        MediaType::event_stream(),
        MediaType::any(),
        MediaType::json().with_parameter("charset", "utf-8"),
        MediaType::from_parts(Type::Application, Tree::Vendor, "acme.thing", Some(Suffix::Xml)),
    ];
    for media_type in cases {
        let parsed: MediaType = media_type.to_string().parse().unwrap();
        assert_eq!(parsed, media_type, "round trip of {media_type}");
    }
}

#[test]
fn test_parse_is_case_insensitive() {
    let parsed: MediaType = "Application/JSON".parse().unwrap();
    assert_eq!(parsed, MediaType::json());

    let parsed: MediaType = "APPLICATION/Problem+JSON".parse().unwrap();
    assert_eq!(parsed, MediaType::problem_json());

    // Parameter names fold, values keep their case.
    let parsed: MediaType = "text/plain;CHARSET=UTF-8".parse().unwrap();
    assert_eq!(parsed.parameter("charset"), Some("UTF-8"));
    assert_eq!(parsed.to_string(), "text/plain;charset=UTF-8");
}

#[test]
fn test_parse_trees() {
    let parsed: MediaType = "application/x-www-form-urlencoded".parse().unwrap();
    assert_eq!(parsed.tree(), Tree::Obsolete);
    assert_eq!(parsed.subtype(), "www-form-urlencoded");
    assert_eq!(parsed.to_string(), "application/x-www-form-urlencoded");

    let parsed: MediaType = "application/vnd.acme.report+json".parse().unwrap();
    assert_eq!(parsed.tree(), Tree::Vendor);
    assert_eq!(parsed.subtype(), "acme.report");
    assert_eq!(parsed.suffix(), Some(Suffix::Json));

    let parsed: MediaType = "application/x.experiment".parse().unwrap();
    assert_eq!(parsed.tree(), Tree::Unregistered);
}

#[test]
fn test_parse_unknown_suffix_stays_in_subtype() {
    let parsed: MediaType = "image/svg+unknownsuffix".parse().unwrap();
    assert_eq!(parsed.subtype(), "svg+unknownsuffix");
    assert_eq!(parsed.suffix(), None);
}

#[test]
fn test_parse_rejects_garbage() {
    assert!("application".parse::<MediaType>().is_err());
    assert!("chemical/x-pdb".parse::<MediaType>().is_err());
    assert!("".parse::<MediaType>().is_err());
    assert!("text/plain;flag".parse::<MediaType>().is_err());
}

#[test]
fn test_compatible_reflexive() {
    for media_type in [MediaType::json(), MediaType::cbor(), MediaType::any()] {
        assert!(media_type.compatible(&media_type));
    }
}

#[test]
fn test_compatible_wildcards() {
    assert!(MediaType::html().compatible(&MediaType::any()));
    assert!(MediaType::any().compatible(&MediaType::html()));
    assert!(MediaType::plain().compatible(&MediaType::any_text()));
    assert!(!MediaType::json().compatible(&MediaType::any_text()));
}

#[test]
fn test_compatible_suffix_must_match() {
    assert!(!MediaType::problem_json().compatible(&MediaType::json()));
    assert!(MediaType::problem_json().compatible(&MediaType::problem_json()));
}

#[test]
fn test_compatible_parameters() {
    let utf8 = MediaType::plain().with_parameter("charset", "utf-8");
    let ascii = MediaType::plain().with_parameter("charset", "ascii");
    let upper = MediaType::plain().with_parameter("charset", "UTF-8");

    // Shared parameter with differing values defeats compatibility.
    assert!(!utf8.compatible(&ascii));
    // Values compare case-insensitively.
    assert!(utf8.compatible(&upper));
    // One-sided parameters are ignored.
    assert!(utf8.compatible(&MediaType::plain()));
    assert!(MediaType::plain().compatible(&utf8));
}

#[test]
fn test_parameter_lookup() {
    let media_type = MediaType::json().with_parameter("Charset", "utf-8");
    assert_eq!(media_type.parameter("charset"), Some("utf-8"));
    assert_eq!(media_type.parameter("CHARSET"), Some("utf-8"));
    assert_eq!(media_type.parameter("boundary"), None);
}

#[test]
fn test_display_sorts_parameters() {
    let media_type = MediaType::json()
        .with_parameter("b", "2")
        .with_parameter("a", "1");
    assert_eq!(media_type.to_string(), "application/json;a=1;b=2");
}
