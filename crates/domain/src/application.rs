use appbundle_core::{AppError, AppResult, NonEmptyString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Root entity of an exported bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    id: NonEmptyString,
    name: NonEmptyString,
    slug: NonEmptyString,
    icon: Option<String>,
    color: Option<String>,
    is_public: bool,
    last_deployed_at: Option<DateTime<Utc>>,
}

impl Application {
    /// Creates a validated application with a slug derived from its name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> AppResult<Self> {
        let name = NonEmptyString::new(name)?;
        let slug = slugify(name.as_str())?;

        Ok(Self {
            id: NonEmptyString::new(id)?,
            name,
            slug,
            icon: None,
            color: None,
            is_public: false,
            last_deployed_at: None,
        })
    }

    /// Returns a copy with presentation attributes set.
    #[must_use]
    pub fn with_appearance(mut self, icon: Option<String>, color: Option<String>) -> Self {
        self.icon = icon.and_then(non_blank);
        self.color = color.and_then(non_blank);
        self
    }

    /// Returns a copy with visibility and deployment state set.
    #[must_use]
    pub fn with_deployment(
        mut self,
        is_public: bool,
        last_deployed_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.is_public = is_public;
        self.last_deployed_at = last_deployed_at;
        self
    }

    /// Returns a copy carrying a new identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> AppResult<Self> {
        self.id = NonEmptyString::new(id)?;
        Ok(self)
    }

    /// Returns a copy carrying a new name; the slug follows the name.
    pub fn renamed(mut self, name: impl Into<String>) -> AppResult<Self> {
        self.name = NonEmptyString::new(name)?;
        self.slug = slugify(self.name.as_str())?;
        Ok(self)
    }

    /// Returns the application identifier.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the application name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the URL slug.
    #[must_use]
    pub fn slug(&self) -> &NonEmptyString {
        &self.slug
    }

    /// Returns the optional icon name.
    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Returns the optional accent color.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Returns whether the published application is publicly viewable.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Returns the last deployment timestamp.
    #[must_use]
    pub fn last_deployed_at(&self) -> Option<DateTime<Utc>> {
        self.last_deployed_at
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim().to_owned();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Lower-cases a display name into a dash separated URL slug.
pub fn slugify(value: &str) -> AppResult<NonEmptyString> {
    let mut slug = String::with_capacity(value.len());
    for character in value.chars() {
        if character.is_ascii_alphanumeric() {
            slug.push(character.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        return Err(AppError::Validation(format!(
            "'{value}' does not contain any characters usable in a slug"
        )));
    }

    NonEmptyString::new(slug)
}

#[cfg(test)]
mod tests {
    use appbundle_core::AppResult;

    use super::{Application, slugify};

    #[test]
    fn slug_follows_name() -> AppResult<()> {
        let application = Application::new("app-1", "Sales Dashboard (EU)")?;
        assert_eq!(application.slug().as_str(), "sales-dashboard-eu");

        let renamed = application.renamed("Sales Dashboard (1)")?;
        assert_eq!(renamed.slug().as_str(), "sales-dashboard-1");
        Ok(())
    }

    #[test]
    fn slug_requires_alphanumeric_characters() {
        assert!(slugify("!!!").is_err());
    }

    #[test]
    fn blank_appearance_values_are_dropped() -> AppResult<()> {
        let application = Application::new("app-1", "Sales")?
            .with_appearance(Some("  ".to_owned()), Some("#ff0000".to_owned()));

        assert_eq!(application.icon(), None);
        assert_eq!(application.color(), Some("#ff0000"));
        Ok(())
    }
}
