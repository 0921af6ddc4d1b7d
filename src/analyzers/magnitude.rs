use crate::config::AnalysisConfig;

/// Describes a mean absolute percentage-point difference between rider classes.
///
/// | Mean difference          | Label    |
/// |--------------------------|----------|
/// | > `large_difference`     | large    |
/// | > `moderate_difference`  | moderate |
/// | otherwise                | small    |
pub fn magnitude(mean_difference: f64, config: &AnalysisConfig) -> &'static str {
    match mean_difference {
        d if d > config.large_difference => "large",
        d if d > config.moderate_difference => "moderate",
        _ => "small",
    }
}

/// Which rider class a signed (casual - member) difference favours.
pub fn direction(difference: f64) -> &'static str {
    if difference > 0.0 {
        "higher casual usage"
    } else {
        "higher member usage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude_boundaries() {
        let config = AnalysisConfig::default();
        assert_eq!(magnitude(12.0, &config), "large");
        assert_eq!(magnitude(5.01, &config), "large");
        assert_eq!(magnitude(5.0, &config), "moderate");
        assert_eq!(magnitude(2.01, &config), "moderate");
        assert_eq!(magnitude(2.0, &config), "small");
        assert_eq!(magnitude(0.0, &config), "small");
    }

    #[test]
    fn test_magnitude_custom_thresholds() {
        let config = AnalysisConfig {
            large_difference: 1.0,
            moderate_difference: 0.5,
            ..Default::default()
        };
        assert_eq!(magnitude(2.0, &config), "large");
        assert_eq!(magnitude(0.75, &config), "moderate");
    }

    #[test]
    fn test_direction() {
        assert_eq!(direction(3.2), "higher casual usage");
        assert_eq!(direction(-3.2), "higher member usage");
        assert_eq!(direction(0.0), "higher member usage");
    }
}
