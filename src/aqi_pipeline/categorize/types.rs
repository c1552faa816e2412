//! AQI category types

use std::fmt;

use serde::Serialize;

/// AQI band, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AqiCategory {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    #[serde(rename = "Unhealthy")]
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    #[serde(rename = "Hazardous")]
    Hazardous,
}

impl AqiCategory {
    /// All categories from least to most severe.
    pub const ALL: [AqiCategory; 6] = [
        AqiCategory::Good,
        AqiCategory::Moderate,
        AqiCategory::UnhealthyForSensitiveGroups,
        AqiCategory::Unhealthy,
        AqiCategory::VeryUnhealthy,
        AqiCategory::Hazardous,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }

    /// Hex display colour.
    pub fn color(&self) -> &'static str {
        match self {
            AqiCategory::Good => "#00e400",
            AqiCategory::Moderate => "#ffff00",
            AqiCategory::UnhealthyForSensitiveGroups => "#ff7e00",
            AqiCategory::Unhealthy => "#ff0000",
            AqiCategory::VeryUnhealthy => "#8f3f97",
            AqiCategory::Hazardous => "#7e0023",
        }
    }

    /// 0 for Good up to 5 for Hazardous.
    pub fn severity(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse haze reading shown next to the AQI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HazeLevel {
    Low,
    Medium,
    High,
}

impl HazeLevel {
    pub fn from_aqi(aqi: f32) -> Self {
        if aqi <= 50.0 {
            HazeLevel::Low
        } else if aqi <= 150.0 {
            HazeLevel::Medium
        } else {
            HazeLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HazeLevel::Low => "Low",
            HazeLevel::Medium => "Medium",
            HazeLevel::High => "High",
        }
    }
}

impl fmt::Display for HazeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_declaration_order() {
        for (i, category) in AqiCategory::ALL.iter().enumerate() {
            assert_eq!(category.severity(), i);
        }
        assert!(AqiCategory::Good < AqiCategory::Hazardous);
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&AqiCategory::UnhealthyForSensitiveGroups).unwrap();
        assert_eq!(json, "\"Unhealthy for Sensitive Groups\"");
    }

    #[test]
    fn test_haze_level_boundaries() {
        assert_eq!(HazeLevel::from_aqi(0.0), HazeLevel::Low);
        assert_eq!(HazeLevel::from_aqi(50.0), HazeLevel::Low);
        assert_eq!(HazeLevel::from_aqi(50.01), HazeLevel::Medium);
        assert_eq!(HazeLevel::from_aqi(150.0), HazeLevel::Medium);
        assert_eq!(HazeLevel::from_aqi(398.0), HazeLevel::High);
    }
}
