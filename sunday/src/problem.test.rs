use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct TestProblem {
    #[serde(rename = "type")]
    type_: Url,
    status: u16,
    extra: String,
}

impl fmt::Display for TestProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test problem: status {}, extra {}", self.status, self.extra)
    }
}

impl std::error::Error for TestProblem {}

impl ProblemType for TestProblem {
    fn type_uri(&self) -> &str {
        self.type_.as_str()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn payload() -> Value {
    json!({
        "type": "http://example.com/test",
        "title": "Test Problem",
        "status": 400,
        "detail": "A Test Problem",
        "extra": "Some Extra",
    })
}

#[test]
fn test_generic_decode_collects_extras_into_parameters() {
    let problem = ProblemRegistry::new().decode(&payload()).unwrap();
    let problem = problem.as_any().downcast_ref::<Problem>().unwrap();

    assert_eq!(problem.type_.as_str(), "http://example.com/test");
    assert_eq!(problem.title.as_deref(), Some("Test Problem"));
    assert_eq!(problem.status, 400);
    assert_eq!(problem.detail.as_deref(), Some("A Test Problem"));
    assert_eq!(problem.parameters.get("extra"), Some(&json!("Some Extra")));
}

#[test]
fn test_registered_type_decodes_native_fields() {
    let mut registry = ProblemRegistry::new();
    registry.register::<TestProblem>("http://example.com/test");

    let problem = registry.decode(&payload()).unwrap();
    assert_eq!(problem.type_uri(), "http://example.com/test");

    let problem = problem.as_any().downcast_ref::<TestProblem>().unwrap();
    assert_eq!(problem.extra, "Some Extra");
    assert_eq!(problem.status, 400);
}

#[test]
fn test_unregistered_type_stays_generic() {
    let mut registry = ProblemRegistry::new();
    registry.register::<TestProblem>("http://example.com/other");

    let problem = registry.decode(&payload()).unwrap();
    assert!(problem.as_any().downcast_ref::<TestProblem>().is_none());
    assert!(problem.as_any().downcast_ref::<Problem>().is_some());
}

#[test]
fn test_default_type_is_about_blank() {
    let problem: Problem = serde_json::from_value(json!({"status": 404})).unwrap();
    assert_eq!(problem.type_.as_str(), "about:blank");
}

#[test]
fn test_from_status_uses_reason_phrase() {
    let problem = Problem::from_status(StatusCode::BAD_REQUEST);
    assert_eq!(problem.status, 400);
    assert_eq!(problem.title.as_deref(), Some("Bad Request"));
    assert_eq!(problem.type_.as_str(), "about:blank");
    assert!(problem.parameters.is_empty());
}

#[test]
fn test_problem_round_trips_through_serde() {
    let problem = Problem {
        type_: Url::parse("http://example.com/test").unwrap(),
        title: Some("Test Problem".into()),
        status: 400,
        detail: None,
        instance: Some(Url::parse("http://example.com/instances/1").unwrap()),
        parameters: Map::new(),
    };
    let round_tripped: Problem =
        serde_json::from_value(serde_json::to_value(&problem).unwrap()).unwrap();
    assert_eq!(round_tripped, problem);
}
