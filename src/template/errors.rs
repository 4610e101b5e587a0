//! Line-aware template errors: every runtime error attaches the template
//! name and the line of the offending expression, plus a suggestion when
//! one is available.

#[derive(Debug, Clone)]
pub struct TemplateError {
    pub template_name: String,
    pub line: u32,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.template_name, self.line, self.message)?;
        if let Some(s) = &self.suggestion {
            write!(f, " (suggestion: {s})")?;
        }
        Ok(())
    }
}

impl std::error::Error for TemplateError {}

impl TemplateError {
    pub fn new(template_name: impl Into<String>, line: u32, message: impl Into<String>) -> Self {
        TemplateError {
            template_name: template_name.into(),
            line,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}
