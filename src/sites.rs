use reqwest::Url;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowOption {
    pub value: String,
    pub label: String,
}

impl FlowOption {
    pub fn new(value: &str, label: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
        }
    }
}

/// Conversion flow a site's primary call-to-action submits to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversionFlow {
    Booking {
        service_categories: Vec<FlowOption>,
        time_slots: Vec<FlowOption>,
        max_advance_days: u32,
    },
    Contact {
        #[serde(default)]
        subjects: Vec<String>,
    },
    Quote {
        service_categories: Vec<FlowOption>,
        #[serde(default)]
        allow_attachments: bool,
    },
    Dispatch {
        urgency_levels: Vec<FlowOption>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    pub name: String,
    pub site_url: String,
    pub contact_email: String,
    pub flow: ConversionFlow,
}

impl SiteConfig {
    /// `host[:port]` of the site URL, lower-cased.
    pub fn host(&self) -> Option<String> {
        let url = Url::parse(&self.site_url).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        Some(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        })
    }

    pub fn booking_options(&self) -> Option<BookingOptions<'_>> {
        match &self.flow {
            ConversionFlow::Booking {
                service_categories,
                time_slots,
                max_advance_days,
            } => Some(BookingOptions {
                service_categories,
                time_slots,
                max_advance_days: *max_advance_days,
            }),
            _ => None,
        }
    }

    pub fn quote_categories(&self) -> Option<&[FlowOption]> {
        match &self.flow {
            ConversionFlow::Quote {
                service_categories, ..
            } => Some(service_categories),
            _ => None,
        }
    }

    pub fn hair_salon_template() -> Self {
        Self {
            id: "hair-salon".to_string(),
            name: "Hair Salon Template".to_string(),
            site_url: "http://localhost:3000".to_string(),
            contact_email: "hello@hairsalontemplate.com".to_string(),
            flow: ConversionFlow::Booking {
                service_categories: vec![
                    FlowOption::new("haircut-style", "Haircut & Style"),
                    FlowOption::new("color-highlights", "Color & Highlights"),
                    FlowOption::new("treatment", "Treatment"),
                    FlowOption::new("special-occasion", "Special Occasion"),
                    FlowOption::new("consultation", "Consultation"),
                ],
                time_slots: vec![
                    FlowOption::new("morning", "Morning (9am - 12pm)"),
                    FlowOption::new("afternoon", "Afternoon (12pm - 4pm)"),
                    FlowOption::new("evening", "Evening (4pm - 8pm)"),
                ],
                max_advance_days: 90,
            },
        }
    }

    pub fn plumber_template() -> Self {
        Self {
            id: "plumber".to_string(),
            name: "Plumber Template".to_string(),
            site_url: "http://localhost:3001".to_string(),
            contact_email: "contact@plumbertemplate.com".to_string(),
            flow: ConversionFlow::Quote {
                service_categories: vec![
                    FlowOption::new("residential-repair", "Residential Repair"),
                    FlowOption::new("commercial-service", "Commercial Service"),
                    FlowOption::new("emergency-response", "Emergency Response"),
                    FlowOption::new("maintenance-plan", "Maintenance Plan"),
                ],
                allow_attachments: true,
            },
        }
    }
}

pub struct BookingOptions<'a> {
    pub service_categories: &'a [FlowOption],
    pub time_slots: &'a [FlowOption],
    pub max_advance_days: u32,
}

impl BookingOptions<'_> {
    pub fn service_label(&self, value: &str) -> Option<&str> {
        self.service_categories
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label.as_str())
    }
}

/// Host-keyed lookup over the configured sites.
pub struct SiteRegistry {
    sites: Vec<(Option<String>, SiteConfig)>,
}

impl SiteRegistry {
    pub fn new(sites: Vec<SiteConfig>) -> Self {
        Self {
            sites: sites.into_iter().map(|s| (s.host(), s)).collect(),
        }
    }

    /// Finds the site serving `host`. A lone site answers every host.
    pub fn resolve(&self, host: Option<&str>) -> Option<&SiteConfig> {
        if self.sites.len() == 1 {
            return self.sites.first().map(|(_, s)| s);
        }

        let host = host?.trim().to_ascii_lowercase();
        self.sites
            .iter()
            .find(|(h, _)| h.as_deref() == Some(host.as_str()))
            .map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
