use std::collections::BTreeMap;

use appraise::domain::models::{QuestionDefinition, RemoteEmployee, TestDefinition};

/// A five-question single-dimension Likert test.
pub fn big5_test() -> TestDefinition {
    TestDefinition {
        id: "big5".into(),
        name: "Big Five".into(),
        test_type: "personality".into(),
        questions: (1..=5)
            .map(|i| QuestionDefinition {
                id: format!("q{i}"),
                ordinal: i,
                dimension: "openness".into(),
                required: true,
                scale_min: 1,
                scale_max: 5,
            })
            .collect(),
        dimension_weights: BTreeMap::new(),
    }
}

/// A two-dimension test with one optional question.
pub fn disc_test() -> TestDefinition {
    TestDefinition {
        id: "disc".into(),
        name: "DISC".into(),
        test_type: "behavior".into(),
        questions: vec![
            QuestionDefinition {
                id: "d1".into(),
                ordinal: 1,
                dimension: "dominance".into(),
                required: true,
                scale_min: 1,
                scale_max: 5,
            },
            QuestionDefinition {
                id: "d2".into(),
                ordinal: 2,
                dimension: "influence".into(),
                required: false,
                scale_min: 1,
                scale_max: 5,
            },
        ],
        dimension_weights: BTreeMap::new(),
    }
}

pub fn remote_employee(external_id: &str, email: &str) -> RemoteEmployee {
    RemoteEmployee {
        external_id: external_id.into(),
        first_name: "Test".into(),
        last_name: external_id.to_uppercase(),
        email: email.into(),
        department: Some("QA".into()),
        position: None,
    }
}
