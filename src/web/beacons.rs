//! Beacon payloads posted by client scripts

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::db::PageViewItem;

/// Pages of a session, either as explicit records or in the older
/// `{"<url>": [view_order, time_spent]}` encoding
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Pages {
    Items(Vec<PageViewItem>),
    Legacy(BTreeMap<String, (i32, i32)>),
}

impl Default for Pages {
    fn default() -> Self {
        Pages::Items(Vec::new())
    }
}

impl Pages {
    pub fn into_items(self) -> Vec<PageViewItem> {
        match self {
            Pages::Items(items) => items,
            Pages::Legacy(map) => {
                let mut items: Vec<PageViewItem> = map
                    .into_iter()
                    .map(|(url, (view_order, time_spent))| {
                        PageViewItem::new(url, view_order, time_spent)
                    })
                    .collect();
                items.sort_by_key(|item| item.view_order);
                items
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SessionBeacon {
    pub referrer: String,
    pub screen_width: i32,
    pub pages: Pages,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageViewBeacon {
    pub url: String,
    pub referrer: String,
    pub screen_width: i32,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventBeacon {
    pub name: String,
    pub data: Map<String, Value>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}
