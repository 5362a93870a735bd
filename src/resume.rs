use crate::forms::{is_valid_email, FormError, FormResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResumeData {
    pub personal_info: PersonalInfo,
    pub education: Vec<Education>,
    pub experience: Vec<Experience>,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub school: String,
    pub degree: String,
    pub year: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Experience {
    pub company: String,
    pub position: String,
    pub duration: String,
    pub description: String,
}

fn blank(parts: &[&str]) -> bool {
    parts.iter().all(|p| p.trim().is_empty())
}

impl ResumeData {
    /// Drops the empty rows the editor starts with and checks the email.
    pub fn normalized(mut self) -> FormResult<ResumeData> {
        let email = self.personal_info.email.trim();
        if !email.is_empty() && !is_valid_email(email) {
            return Err(FormError::InvalidEmail);
        }

        self.education
            .retain(|e| !blank(&[e.school.as_str(), e.degree.as_str(), e.year.as_str()]));
        self.experience
            .retain(|e| {
                !blank(&[
                    e.company.as_str(),
                    e.position.as_str(),
                    e.duration.as_str(),
                    e.description.as_str(),
                ])
            });
        self.skills = self
            .skills
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let info = &self.personal_info;

        let _ = writeln!(out, "{}", info.name);
        let contact: Vec<&str> = [info.email.as_str(), info.phone.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if !contact.is_empty() {
            let _ = writeln!(out, "{}", contact.join(" | "));
        }
        if !info.summary.is_empty() {
            let _ = writeln!(out, "\n{}", info.summary);
        }

        if !self.education.is_empty() {
            out.push_str("\nEDUCATION\n");
            for edu in &self.education {
                let _ = writeln!(out, "- {}, {} ({})", edu.degree, edu.school, edu.year);
            }
        }

        if !self.experience.is_empty() {
            out.push_str("\nEXPERIENCE\n");
            for exp in &self.experience {
                let _ = writeln!(out, "- {} at {} ({})", exp.position, exp.company, exp.duration);
                if !exp.description.is_empty() {
                    let _ = writeln!(out, "  {}", exp.description);
                }
            }
        }

        if !self.skills.is_empty() {
            let _ = writeln!(out, "\nSKILLS\n{}", self.skills.join(", "));
        }
        out
    }
}
