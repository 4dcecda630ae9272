//! OS and browser detection from User-Agent strings

use woothee::parser::Parser;

/// Coarse client platform, empty when unknown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Platform {
    pub os: String,
    pub browser: String,
}

pub fn detect(user_agent: &str) -> Platform {
    if user_agent.is_empty() {
        return Platform::default();
    }

    let result = Parser::new().parse(user_agent).unwrap_or_default();

    Platform {
        os: known(result.os),
        browser: known(result.name),
    }
}

fn known(value: &str) -> String {
    if value.is_empty() || value == "UNKNOWN" {
        String::new()
    } else {
        value.to_string()
    }
}
