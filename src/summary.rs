// src/summary.rs

use crate::types::ClasswiseCount;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassSummary {
    pub name: String,
    #[serde(rename = "in")]
    pub incoming: u64,
    #[serde(rename = "out")]
    pub outgoing: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VehicleSummary {
    pub total: u64,
    pub total_in: u64,
    pub total_out: u64,
    pub classes: Vec<ClassSummary>,
}

impl VehicleSummary {
    pub fn from_counts(counts: &ClasswiseCount) -> Self {
        let classes: Vec<ClassSummary> = counts
            .iter()
            .map(|(name, count)| ClassSummary {
                name: name.to_string(),
                incoming: count.incoming,
                outgoing: count.outgoing,
                total: count.total(),
            })
            .collect();

        let total_in = classes.iter().map(|c| c.incoming).sum();
        let total_out = classes.iter().map(|c| c.outgoing).sum();

        Self {
            total: total_in + total_out,
            total_in,
            total_out,
            classes,
        }
    }
}

impl fmt::Display for VehicleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total Vehicles: {} (IN: {}, OUT: {})",
            self.total, self.total_in, self.total_out
        )?;
        for class in &self.classes {
            write!(
                f,
                "\n{}: {} (IN: {}, OUT: {})",
                capitalize(&class.name),
                class.total,
                class.incoming,
                class.outgoing
            )?;
        }
        Ok(())
    }
}

/// Renders the final count mapping as display text.
pub fn summarize(counts: &ClasswiseCount) -> String {
    VehicleSummary::from_counts(counts).to_string()
}

/// First character upper-cased, the rest lower-cased.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DirectionalCount;

    fn counts(entries: &[(&str, u64, u64)]) -> ClasswiseCount {
        entries
            .iter()
            .map(|(name, i, o)| (name.to_string(), DirectionalCount::new(*i, *o)))
            .collect()
    }

    #[test]
    fn test_totals_for_car_and_truck() {
        let summary = VehicleSummary::from_counts(&counts(&[("car", 5, 2), ("truck", 1, 1)]));
        assert_eq!(summary.total, 9);
        assert_eq!(summary.total_in, 6);
        assert_eq!(summary.total_out, 3);
        assert_eq!(summary.total, summary.total_in + summary.total_out);
    }

    #[test]
    fn test_rendered_text() {
        let text = summarize(&counts(&[("car", 2, 1), ("truck", 0, 0)]));
        assert_eq!(
            text,
            "Total Vehicles: 3 (IN: 2, OUT: 1)\nCar: 3 (IN: 2, OUT: 1)\nTruck: 0 (IN: 0, OUT: 0)"
        );
    }

    #[test]
    fn test_empty_counts() {
        assert_eq!(summarize(&ClasswiseCount::new()), "Total Vehicles: 0 (IN: 0, OUT: 0)");
    }

    #[test]
    fn test_summarize_is_pure() {
        let input = counts(&[("bus", 4, 0), ("motorcycle", 1, 3)]);
        assert_eq!(summarize(&input), summarize(&input));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("car"), "Car");
        assert_eq!(capitalize("MOTORCYCLE"), "Motorcycle");
        assert_eq!(capitalize("traffic light"), "Traffic light");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_json_shape() {
        let summary = VehicleSummary::from_counts(&counts(&[("car", 1, 0)]));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["classes"][0]["name"], "car");
        assert_eq!(json["classes"][0]["in"], 1);
    }
}
