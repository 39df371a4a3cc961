use serde::Deserialize;

/// `{"href": "..."}` entry of an Azure DevOps `_links` object.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Link {
    #[serde(default)]
    pub href: Option<String>,
}

/// Azure DevOps reference links. Only the browser-facing relations are read.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Links {
    #[serde(default)]
    pub html: Option<Link>,
    #[serde(default)]
    pub web: Option<Link>,
}

impl Links {
    pub fn html_href(&self) -> Option<&str> {
        href_of(self.html.as_ref())
    }

    pub fn web_href(&self) -> Option<&str> {
        href_of(self.web.as_ref())
    }
}

fn href_of(link: Option<&Link>) -> Option<&str> {
    link.and_then(|link| link.href.as_deref())
        .map(str::trim)
        .filter(|href| !href.is_empty())
}
