use std::collections::BTreeMap;

use chrono::Duration;
use proptest::prelude::*;
use uuid::Uuid;

use appraise::domain::models::{Answer, QuestionDefinition, TestDefinition, TestSession};
use appraise::services::ResultComputer;

fn test_with_dimensions() -> TestDefinition {
    let dimensions = ["openness", "diligence", "empathy"];
    TestDefinition {
        id: "prop".into(),
        name: "Property Test".into(),
        test_type: "synthetic".into(),
        questions: (0..9u32)
            .map(|i| QuestionDefinition {
                id: format!("q{i}"),
                ordinal: i + 1,
                dimension: dimensions[(i % 3) as usize].into(),
                required: false,
                scale_min: 1,
                scale_max: 5,
            })
            .collect(),
        dimension_weights: BTreeMap::new(),
    }
}

proptest! {
    /// Scores stay in bounds for any subset of answers with any raw
    /// values, and dimensions nobody answered never appear.
    #[test]
    fn scores_stay_in_bounds(answers in proptest::collection::vec((0usize..9, -10i32..20), 0..30)) {
        let test = test_with_dimensions();
        let session = TestSession::new("prop".into(), Uuid::new_v4(), 9, Duration::hours(1));

        // Last submission per question wins, as the upsert would do.
        let mut latest: BTreeMap<usize, i32> = BTreeMap::new();
        for (question, value) in answers {
            latest.insert(question, value);
        }

        let answers: Vec<Answer> = latest
            .iter()
            .map(|(question, value)| Answer::new(&session, format!("q{question}"), *value))
            .collect();

        let result = ResultComputer::new().compute(&session, &answers, &test).unwrap();

        prop_assert!(result.overall_score <= 100);
        for score in result.dimension_scores.values() {
            prop_assert!((0.0..=100.0).contains(score));
        }

        let answered_dimensions: std::collections::BTreeSet<&str> = latest
            .keys()
            .map(|i| test.questions[*i].dimension.as_str())
            .collect();
        for dimension in result.dimension_scores.keys() {
            prop_assert!(answered_dimensions.contains(dimension.as_str()));
        }
        prop_assert_eq!(result.metadata.total_answers as usize, latest.len());
    }
}
