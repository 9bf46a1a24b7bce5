use multiphys::error::ConfigurationError;
use multiphys::parameters::{ParameterValue, Parameters};

#[test]
fn json_values_map_to_the_natural_variant() {
    let json = r#"{
        "variable": "u",
        "diffusivity": 2.5,
        "order": 2,
        "enabled": true,
        "values": ["a", "b"],
        "coefficients": [1.0, 2]
    }"#;
    let parameters: Parameters = serde_json::from_str(json).unwrap();
    assert_eq!(parameters.get("variable"), Some(&ParameterValue::Text("u".to_string())));
    assert_eq!(parameters.get("diffusivity"), Some(&ParameterValue::Real(2.5)));
    assert_eq!(parameters.get("order"), Some(&ParameterValue::Integer(2)));
    assert_eq!(parameters.get("enabled"), Some(&ParameterValue::Boolean(true)));
    assert_eq!(
        parameters.text_list("sum", "values").unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
    assert_eq!(parameters.real_list("sum", "coefficients").unwrap(), vec![1.0, 2.0]);
    assert_eq!(parameters.keys().count(), 6);
}

#[test]
fn typed_getters_convert_where_sensible() {
    let parameters = Parameters::new()
        .with("order", 2)
        .with("variable", "u")
        .with("flag", false);
    assert_eq!(parameters.real("k", "order").unwrap(), 2.0);
    assert_eq!(parameters.real_or("k", "missing", 0.5).unwrap(), 0.5);
    assert_eq!(parameters.text_list("k", "variable").unwrap(), vec!["u".to_string()]);
    assert!(parameters.text_list("k", "missing").unwrap().is_empty());
    assert_eq!(parameters.optional_text("k", "missing").unwrap(), None);
    assert!(!parameters.boolean_or("k", "flag", true).unwrap());
    assert!(parameters.boolean_or("k", "missing", true).unwrap());
}

#[test]
fn missing_and_mistyped_parameters_name_the_object() {
    let parameters = Parameters::new().with("variable", "u").with("diffusivity", "high");

    assert_eq!(
        parameters.real("diffusion", "coefficient").unwrap_err(),
        ConfigurationError::MissingParameter {
            object: "diffusion".to_string(),
            parameter: "coefficient".to_string(),
        }
    );

    let error = parameters.real("diffusion", "diffusivity").unwrap_err();
    assert_eq!(
        error.to_string(),
        "parameter `diffusivity` of `diffusion` is invalid: expected real, found text"
    );
    assert!(parameters.boolean_or("diffusion", "variable", false).is_err());
}
