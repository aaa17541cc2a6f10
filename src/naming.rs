use {
    crate::CfnError,
    lazy_static::lazy_static,
    regex::Regex,
};

lazy_static! {
    static ref SEPARATORS: Regex = Regex::new(r"[^A-Za-z0-9]+").unwrap();
    static ref STACK_NAME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").unwrap();
}

/// Convert a human-readable resource name into a CloudFormation logical id.
///
/// The name is split on runs of non-alphanumeric characters; each part has its first character upper-cased and the
/// rest left alone. `config-test-bucket` becomes `ConfigTestBucket` and `testapi-GET-/api1` becomes `TestapiGETApi1`.
/// Distinct names can map to the same id (`my-bucket` and `my_bucket`); [Template][crate::Template] detects this.
pub fn name_to_id(name: &str) -> Result<String, CfnError> {
    let mut result = String::with_capacity(name.len());
    for part in SEPARATORS.split(name) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            result.push(first.to_ascii_uppercase());
            result.push_str(chars.as_str());
        }
    }

    if result.is_empty() {
        return Err(CfnError::InvalidResourceName(name.to_string()));
    }

    Ok(result)
}

/// Check a stack name against CloudFormation's rules: a letter followed by up to 127 letters, digits, or hyphens.
pub fn validate_stack_name(name: &str) -> Result<(), CfnError> {
    if STACK_NAME.is_match(name) {
        Ok(())
    } else {
        Err(CfnError::InvalidStackName(name.to_string()))
    }
}
