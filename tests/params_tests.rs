#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use neuroevo::neat::error::NeatError;
use neuroevo::neat::params::Params;
use neuroevo::neat::selection::ParentSelection;
use neuroevo::neat::sensors::Diet;
use std::fs;

#[test]
fn test_save_and_load() {
    let params = Params {
        population_size: 64,
        diet: Diet::Carnivore,
        parent_selection: ParentSelection::Rank,
        fitness_sharing: true,
        seed: 1234,
        ..Params::default()
    };

    let path = std::env::temp_dir().join(format!("neuroevo_params_{}.json", std::process::id()));
    params.save_to_file(&path).expect("Failed to save params");
    let loaded = Params::load_from_file(&path).expect("Failed to load params");
    fs::remove_file(&path).ok();

    assert_eq!(loaded, params);
}

#[test]
fn test_load_rejects_invalid_values() {
    let path = std::env::temp_dir().join(format!("neuroevo_invalid_{}.json", std::process::id()));
    fs::write(&path, r#"{ "survival_rate": 0.0 }"#).unwrap();
    let result = Params::load_from_file(&path);
    fs::remove_file(&path).ok();

    assert!(matches!(result, Err(NeatError::InvalidParams(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let result = Params::load_from_file("/nonexistent/neuroevo/params.json");
    assert!(matches!(result, Err(NeatError::Io(_))));
}

#[test]
fn test_malformed_json_is_json_error() {
    let result = Params::from_json_str("{ population_size: }");
    assert!(matches!(result, Err(NeatError::Json(_))));
}

#[test]
fn test_validate_rejections() {
    let cases = [
        Params {
            population_size: 0,
            ..Params::default()
        },
        Params {
            input_count: 0,
            ..Params::default()
        },
        Params {
            tournament_size: 0,
            ..Params::default()
        },
        Params {
            stagnation_limit: 0,
            ..Params::default()
        },
        Params {
            species_divergence_threshold: f32::NAN,
            ..Params::default()
        },
        Params {
            survival_rate: 1.5,
            ..Params::default()
        },
    ];
    for params in cases {
        assert!(
            matches!(params.validate(), Err(NeatError::InvalidParams(_))),
            "accepted {:?}",
            params
        );
    }
}

#[test]
fn test_enums_use_variant_names() {
    let json = serde_json::to_string(&Params {
        diet: Diet::Herbivore,
        parent_selection: ParentSelection::Roulette,
        ..Params::default()
    })
    .unwrap();
    assert!(json.contains(r#""diet":"Herbivore""#));
    assert!(json.contains(r#""parent_selection":"Roulette""#));
}
