use std::fmt;

/// City id for Riyadh, used by every descriptor of the default catalog.
pub const DEFAULT_CITY_ID: &str = "6009d941950ada00061eeeab";

/// One immutable parameter combination used to request one page of listings.
///
/// Parameter order is kept as given so request URLs are reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryDescriptor {
    params: Vec<(String, String)>,
}

impl QueryDescriptor {
    pub fn new<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.params {
            if !first {
                f.write_str("&")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

fn city_query(cursor: (&str, &str), extra: Option<(&str, &str)>) -> QueryDescriptor {
    let mut params = vec![cursor, ("limit", "10"), ("city", DEFAULT_CITY_ID)];
    params.extend(extra);
    QueryDescriptor::new(params)
}

/// The ordered catalog tried in every session: plain pagination, offset
/// pagination, sorted first pages, then filtered first pages.
pub fn default_catalog() -> Vec<QueryDescriptor> {
    let mut catalog = Vec::with_capacity(18);
    for page in ["1", "2", "3", "4", "5"] {
        catalog.push(city_query(("page", page), None));
    }
    for offset in ["0", "10", "20", "30", "40"] {
        catalog.push(city_query(("offset", offset), None));
    }
    for sort in ["createdAt", "-createdAt", "price", "-price"] {
        catalog.push(city_query(("page", "1"), Some(("sort", sort))));
    }
    for (key, value) in [
        ("adPurpose", "SALE"),
        ("adPurpose", "RENT"),
        ("minPrice", "500000"),
        ("maxPrice", "1000000"),
    ] {
        catalog.push(city_query(("page", "1"), Some((key, value))));
    }
    catalog
}
