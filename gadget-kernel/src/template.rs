//! `{{variable}}` substitution for tool descriptions.

use std::collections::HashMap;

use crate::error::{KernelError, KernelResult};

/// A text template whose `{{name}}` placeholders must all be supplied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    text: &'static str,
}

impl Template {
    /// Wraps template text.
    #[must_use]
    pub const fn new(text: &'static str) -> Self {
        Self { text }
    }

    /// Returns the names referenced by the template, in order of appearance.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        extract_variable_refs(self.text)
    }

    /// Renders the template in a single pass, so substituted values are
    /// never scanned for placeholders themselves.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::MissingVariable`] if a placeholder has no value.
    pub fn render(&self, vars: &HashMap<&str, String>) -> KernelResult<String> {
        let mut result = String::with_capacity(self.text.len());
        let mut rest = self.text;
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                break;
            };
            result.push_str(&rest[..start]);
            let name = after[..end].trim();
            if name.is_empty() {
                result.push_str(&rest[start..start + 2 + end + 2]);
            } else {
                let value = vars
                    .get(name)
                    .ok_or_else(|| KernelError::MissingVariable { name: name.to_owned() })?;
                result.push_str(value);
            }
            rest = &after[end + 2..];
        }
        result.push_str(rest);
        Ok(result)
    }
}

fn extract_variable_refs(template: &str) -> Vec<String> {
    let mut vars: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = after[..end].trim();
        if !name.is_empty() && !vars.iter().any(|var| var == name) {
            vars.push(name.to_owned());
        }
        rest = &after[end + 2..];
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_occurrence() {
        let template = Template::new("{{name}} on {{env}}; again {{name}}");
        let vars = HashMap::from([("name", "gadget_trace_dns".to_owned()), ("env", "linux".to_owned())]);
        assert_eq!(
            template.render(&vars).unwrap(),
            "gadget_trace_dns on linux; again gadget_trace_dns"
        );
        assert_eq!(template.variables(), ["name", "env"]);
    }

    #[test]
    fn missing_variable_is_an_error() {
        let template = Template::new("{{name}} {{fields}}");
        let vars = HashMap::from([("name", "x".to_owned())]);
        assert!(matches!(
            template.render(&vars),
            Err(KernelError::MissingVariable { name }) if name == "fields"
        ));
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let template = Template::new("{{description}}\n{{ fields }}");
        let vars = HashMap::from([
            ("description", "prints {{fields}} verbatim".to_owned()),
            ("fields", "comm".to_owned()),
        ]);
        assert_eq!(template.render(&vars).unwrap(), "prints {{fields}} verbatim\ncomm");
    }

    #[test]
    fn unterminated_placeholder_is_left_alone() {
        let template = Template::new("value {{open");
        assert!(template.variables().is_empty());
        assert_eq!(template.render(&HashMap::new()).unwrap(), "value {{open");
    }
}
