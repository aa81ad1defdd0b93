//! Office connector card sent to the incoming webhook.
//!
//! A [`Payload`] always carries exactly one section and one action; the
//! fixed-size arrays keep that shape on both serialization and parsing.

use serde::{Deserialize, Serialize};

pub const SUMMARY: &str = "Sonar report";
pub const THEME_COLOR: &str = "#00FF00";
pub const ACTIVITY_TITLE: &str = "Sonar Quality Report";
pub const REPORT_ACTION: &str = "See report";

const ACTION_CONTEXT: &str = "http://schema.org";
const ACTION_TYPE: &str = "ViewAction";

/// Message card. Built once per notification and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    summary: String,
    theme_color: String,
    sections: [Section; 1],
    potential_action: [Action; 1],
}

impl Payload {
    #[must_use]
    pub fn new(activity_subtitle: String, facts: Vec<Fact>, report_url: String) -> Self {
        Self {
            summary: SUMMARY.to_string(),
            theme_color: THEME_COLOR.to_string(),
            sections: [Section {
                markdown: true,
                facts,
                activity_title: ACTIVITY_TITLE.to_string(),
                activity_subtitle,
            }],
            potential_action: [Action::view(REPORT_ACTION, report_url)],
        }
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    #[must_use]
    pub fn theme_color(&self) -> &str {
        &self.theme_color
    }

    #[must_use]
    pub fn section(&self) -> &Section {
        &self.sections[0]
    }

    #[must_use]
    pub fn action(&self) -> &Action {
        &self.potential_action[0]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    markdown: bool,
    facts: Vec<Fact>,
    activity_title: String,
    activity_subtitle: String,
}

impl Section {
    #[must_use]
    pub const fn markdown(&self) -> bool {
        self.markdown
    }

    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    #[must_use]
    pub fn activity_title(&self) -> &str {
        &self.activity_title
    }

    #[must_use]
    pub fn activity_subtitle(&self) -> &str {
        &self.activity_subtitle
    }
}

/// One name/value row of the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub name: String,
    pub value: String,
}

impl Fact {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Call-to-action link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "@context")]
    context: String,
    #[serde(rename = "@type")]
    kind: String,
    name: String,
    target: [String; 1],
}

impl Action {
    fn view(name: &str, target: String) -> Self {
        Self {
            context: ACTION_CONTEXT.to_string(),
            kind: ACTION_TYPE.to_string(),
            name: name.to_string(),
            target: [target],
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target[0]
    }
}
