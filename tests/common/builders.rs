//! Sample longevity questionnaire shared by the integration tests

use intake_flow::collaborators::{InMemoryPersistence, PersistenceApi};
use intake_flow::conditions::Condition;
use intake_flow::derived::DerivedRule;
use intake_flow::eligibility::DisqualificationRule;
use intake_flow::fields::{FieldDef, FieldKind, FieldValue};
use intake_flow::flow::IntakeFlow;
use intake_flow::segments::{Segment, SkipRule};
use intake_flow::submission::SanitizationRules;
use intake_flow::telemetry::{
    BroadcastTelemetryTransport, InMemorySessionStorage, SessionManager, SessionStorage,
    TelemetryEmitter,
};
use intake_flow::validation::FieldRule;
use intake_flow::{FlowDefinition, NONE_OF_THE_ABOVE};
use std::sync::Arc;
use std::time::Duration;

pub const SESSION_KEY: &str = "intake_session_id";

/// Five segments: about_you, body, habits, smoking (hidden for non-smokers), health
pub fn longevity_definition() -> FlowDefinition {
    FlowDefinition::builder("longevity")
        .field("first_name", FieldDef::new(FieldKind::Text))
        .field("email", FieldDef::new(FieldKind::Text))
        .field("date_of_birth", FieldDef::new(FieldKind::Text))
        .field("feet", FieldDef::new(FieldKind::Text))
        .field("inches", FieldDef::new(FieldKind::Text))
        .field("pounds", FieldDef::new(FieldKind::Text))
        .field("bmi", FieldDef::new(FieldKind::Number))
        .field("smoker", FieldDef::new(FieldKind::Text))
        .field("packs_per_day", FieldDef::new(FieldKind::Text))
        .field(
            "conditions",
            FieldDef::new(FieldKind::MultiSelect).with_sentinel(NONE_OF_THE_ABOVE),
        )
        .field("pregnant", FieldDef::new(FieldKind::Text))
        .field("gender", FieldDef::new(FieldKind::Text))
        .field("address", FieldDef::new(FieldKind::Object))
        .field("photo_id", FieldDef::new(FieldKind::Text))
        .segment(Segment::new("about_you", ["first_name", "email", "date_of_birth"]))
        .segment(Segment::new("body", ["feet", "inches", "pounds"]))
        .segment(
            Segment::new("habits", ["smoker"])
                .with_skip_rule(SkipRule::skip_next(Condition::equals("smoker", "no"), 1)),
        )
        .segment(Segment::new("smoking", ["packs_per_day"]).conditional())
        .segment(Segment::new(
            "health",
            ["conditions", "pregnant", "gender", "address", "photo_id"],
        ))
        .rule("first_name", FieldRule::required())
        .rule("email", FieldRule::required())
        .rule(
            "email",
            FieldRule::pattern(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
                .with_message("Please enter a valid email address"),
        )
        .rule("date_of_birth", FieldRule::required())
        .rule("feet", FieldRule::required())
        .rule("inches", FieldRule::required())
        .rule("pounds", FieldRule::required())
        .rule("pounds", FieldRule::number_range(Some(50.0), Some(1000.0)))
        .rule("smoker", FieldRule::required())
        .rule("smoker", FieldRule::one_of(["yes", "no"]))
        .rule(
            "packs_per_day",
            FieldRule::required_if(Condition::equals("smoker", "yes")),
        )
        .rule("conditions", FieldRule::non_empty_list())
        .rule("pregnant", FieldRule::required())
        .rule("pregnant", FieldRule::one_of(["yes", "no"]))
        .rule("gender", FieldRule::one_of(["male", "female", "other"]))
        .disqualify(DisqualificationRule::new(
            "about_you",
            Condition::age_under("date_of_birth", 18),
            "under_age",
        ))
        .disqualify(DisqualificationRule::new(
            "health",
            Condition::equals("pregnant", "yes"),
            "pregnant",
        ))
        .disqualify(DisqualificationRule::new(
            "health",
            Condition::contains_other_than("conditions", Some(NONE_OF_THE_ABOVE)),
            "medical_exclusion",
        ))
        .derived(DerivedRule::bmi("feet", "inches", "pounds", "bmi"))
        .sanitization(
            SanitizationRules::default()
                .optional_enum("gender")
                .nested("address", ["line2"]),
        )
        .identity_field("first_name")
        .identity_field("email")
        .build()
        .expect("sample questionnaire is valid")
}

/// A flow wired to in-process collaborators, with handles to observe them
pub struct TestFlow {
    pub flow: IntakeFlow,
    pub telemetry: BroadcastTelemetryTransport,
    pub storage: Arc<InMemorySessionStorage>,
}

impl TestFlow {
    pub fn session_in_storage(&self) -> Option<String> {
        self.storage.get(SESSION_KEY).expect("in-memory storage")
    }
}

pub fn test_flow(persistence: Arc<dyn PersistenceApi>) -> TestFlow {
    test_flow_with_debounce(persistence, Duration::ZERO)
}

pub fn test_flow_with_debounce(
    persistence: Arc<dyn PersistenceApi>,
    debounce: Duration,
) -> TestFlow {
    let telemetry = BroadcastTelemetryTransport::new(64);
    let storage = Arc::new(InMemorySessionStorage::new());
    let session = SessionManager::new(storage.clone(), SESSION_KEY);
    let emitter = TelemetryEmitter::new(Arc::new(telemetry.clone()), session, debounce);
    let flow = IntakeFlow::new(Arc::new(longevity_definition()), emitter, persistence);
    TestFlow {
        flow,
        telemetry,
        storage,
    }
}

pub fn in_memory_flow() -> TestFlow {
    test_flow(Arc::new(InMemoryPersistence::new("authid")))
}

pub fn answer_about_you(flow: &mut IntakeFlow) {
    flow.set_field("first_name", FieldValue::text("Ada")).unwrap();
    flow.set_field("email", FieldValue::text("ada@example.com"))
        .unwrap();
    flow.set_field("date_of_birth", FieldValue::text("1980-05-17"))
        .unwrap();
}

pub fn answer_body(flow: &mut IntakeFlow) {
    flow.set_field("feet", FieldValue::text("5")).unwrap();
    flow.set_field("inches", FieldValue::text("10")).unwrap();
    flow.set_field("pounds", FieldValue::text("180")).unwrap();
}

pub fn answer_health(flow: &mut IntakeFlow) {
    flow.set_array_field("conditions", NONE_OF_THE_ABOVE, true)
        .unwrap();
    flow.set_field("pregnant", FieldValue::text("no")).unwrap();
}

/// Answers every segment as a non-smoker and walks to the final segment
pub fn walk_to_health(flow: &mut IntakeFlow) {
    answer_about_you(flow);
    flow.next().unwrap();
    answer_body(flow);
    flow.next().unwrap();
    flow.set_field("smoker", FieldValue::text("no")).unwrap();
    flow.next().unwrap();
}
