use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "C",
            TemperatureUnit::Fahrenheit => "F",
        }
    }

    fn from_symbol(symbol: &str) -> Result<Self, String> {
        match symbol {
            "C" | "c" => Ok(TemperatureUnit::Celsius),
            "F" | "f" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err(format!("Unrecognized temperature symbol '{}'", symbol)),
        }
    }
}

impl Display for TemperatureUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// An absolute temperature reading.
/// Comparisons and arithmetic between two temperatures are done in Fahrenheit
/// so the units of the two sides never matter.
#[derive(Debug, Clone, Copy, SerializeDisplay, DeserializeFromStr)]
pub struct Temperature {
    value: f64,
    unit: TemperatureUnit,
}

impl Temperature {
    pub const fn new(value: f64, unit: TemperatureUnit) -> Self {
        Self { value, unit }
    }

    pub const fn f(value: f64) -> Self {
        Self::new(value, TemperatureUnit::Fahrenheit)
    }

    pub const fn c(value: f64) -> Self {
        Self::new(value, TemperatureUnit::Celsius)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    pub fn get(&self, unit: TemperatureUnit) -> f64 {
        match (self.unit, unit) {
            (from, to) if from == to => self.value,
            (TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit) => self.value * 1.8 + 32.0,
            (TemperatureUnit::Fahrenheit, _) => (self.value - 32.0) / 1.8,
            (TemperatureUnit::Celsius, _) => self.value,
        }
    }

    pub fn as_f(&self) -> f64 {
        self.get(TemperatureUnit::Fahrenheit)
    }

    pub fn as_c(&self) -> f64 {
        self.get(TemperatureUnit::Celsius)
    }

    /// The magnitude of the difference between the two temperatures, in this temperature's unit.
    pub fn difference(&self, other: &Temperature) -> TemperatureWindow {
        TemperatureWindow::new((self.value - other.get(self.unit)).abs(), self.unit)
    }
}

impl PartialEq for Temperature {
    fn eq(&self, other: &Self) -> bool {
        self.as_f() == other.as_f()
    }
}

impl PartialOrd for Temperature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.as_f().partial_cmp(&other.as_f())
    }
}

impl Add for Temperature {
    type Output = Temperature;

    fn add(self, rhs: Temperature) -> Self::Output {
        Temperature::f(self.as_f() + rhs.as_f())
    }
}

impl Sub for Temperature {
    type Output = Temperature;

    fn sub(self, rhs: Temperature) -> Self::Output {
        Temperature::f(self.as_f() - rhs.as_f())
    }
}

impl Add<TemperatureWindow> for Temperature {
    type Output = Temperature;

    fn add(self, rhs: TemperatureWindow) -> Self::Output {
        Temperature::new(self.value + rhs.get(self.unit), self.unit)
    }
}

impl Sub<TemperatureWindow> for Temperature {
    type Output = Temperature;

    fn sub(self, rhs: TemperatureWindow) -> Self::Output {
        Temperature::new(self.value - rhs.get(self.unit), self.unit)
    }
}

/// Formats as "64.8F", "43C" etc.
impl Display for Temperature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

impl FromStr for Temperature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (value, unit) = split_unit(s)?;
        Ok(Temperature::new(value, unit))
    }
}

/// A change in temperature rather than an absolute reading. 1 degree F is 1/1.8 degrees C.
/// Always non-negative. A zero window is the same in every unit.
#[derive(Debug, Clone, Copy, SerializeDisplay, DeserializeFromStr)]
pub struct TemperatureWindow {
    value: f64,
    unit: TemperatureUnit,
}

impl TemperatureWindow {
    pub const ZERO: TemperatureWindow = TemperatureWindow {
        value: 0.0,
        unit: TemperatureUnit::Celsius,
    };

    /// Panics if the value is negative, use [TemperatureWindow::try_new] for untrusted values.
    pub fn new(value: f64, unit: TemperatureUnit) -> Self {
        assert!(value >= 0.0, "Cannot create a negative temperature window of {}{}", value, unit);
        Self { value, unit }
    }

    pub fn try_new(value: f64, unit: TemperatureUnit) -> Result<Self, String> {
        if value.is_nan() || value < 0.0 {
            return Err(format!("Cannot create a negative temperature window of {}{}", value, unit));
        }
        Ok(Self { value, unit })
    }

    pub fn f(value: f64) -> Self {
        Self::new(value, TemperatureUnit::Fahrenheit)
    }

    pub fn c(value: f64) -> Self {
        Self::new(value, TemperatureUnit::Celsius)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    pub fn get(&self, unit: TemperatureUnit) -> f64 {
        match (self.unit, unit) {
            (from, to) if from == to => self.value,
            (TemperatureUnit::Fahrenheit, _) => self.value / 1.8,
            (TemperatureUnit::Celsius, _) => self.value * 1.8,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}

impl PartialEq for TemperatureWindow {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.get(self.unit)
    }
}

impl PartialOrd for TemperatureWindow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.get(self.unit))
    }
}

impl Add for TemperatureWindow {
    type Output = TemperatureWindow;

    fn add(self, rhs: TemperatureWindow) -> Self::Output {
        TemperatureWindow::new(self.value + rhs.get(self.unit), self.unit)
    }
}

impl Add<Temperature> for TemperatureWindow {
    type Output = Temperature;

    fn add(self, rhs: Temperature) -> Self::Output {
        rhs + self
    }
}

impl Mul<f64> for TemperatureWindow {
    type Output = TemperatureWindow;

    fn mul(self, rhs: f64) -> Self::Output {
        TemperatureWindow::new(self.value * rhs, self.unit)
    }
}

impl Div<f64> for TemperatureWindow {
    type Output = TemperatureWindow;

    fn div(self, rhs: f64) -> Self::Output {
        TemperatureWindow::new(self.value / rhs, self.unit)
    }
}

/// Dimensionless ratio of two windows.
impl Div for TemperatureWindow {
    type Output = f64;

    fn div(self, rhs: TemperatureWindow) -> Self::Output {
        self.value / rhs.get(self.unit)
    }
}

impl Display for TemperatureWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

impl FromStr for TemperatureWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "0" {
            return Ok(TemperatureWindow::ZERO);
        }
        let (value, unit) = split_unit(s)?;
        TemperatureWindow::try_new(value, unit)
    }
}

fn split_unit(s: &str) -> Result<(f64, TemperatureUnit), String> {
    let s = s.trim();
    let (last, _) = s.char_indices().last()
        .ok_or_else(|| "Empty temperature string".to_owned())?;
    let (number, symbol) = s.split_at(last);
    let unit = TemperatureUnit::from_symbol(symbol)?;
    let value = number
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("Invalid temperature value '{}': {}", s, e))?;
    if !value.is_finite() {
        return Err(format!("Temperature must be a finite number, was '{}'", s));
    }
    Ok((value, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion() {
        assert_eq!(Temperature::c(100.0).as_f(), 212.0);
        assert_eq!(Temperature::f(32.0).as_c(), 0.0);
        assert_eq!(Temperature::c(10.0), Temperature::f(50.0));
        assert!(Temperature::c(10.0) < Temperature::f(51.0));
        assert!(Temperature::c(10.0) > Temperature::f(49.0));
    }

    #[test]
    fn test_window_arithmetic() {
        let one_c = TemperatureWindow::c(1.0);
        assert_eq!(one_c.get(TemperatureUnit::Fahrenheit), 1.8);
        assert_eq!(one_c, TemperatureWindow::f(1.8));

        let sum = TemperatureWindow::f(1.0) + TemperatureWindow::f(0.5);
        assert_eq!(sum, TemperatureWindow::f(1.5));
        assert_eq!(TemperatureWindow::f(1.0) * 1.2, TemperatureWindow::f(1.2));
        assert_eq!(TemperatureWindow::f(1.0) / TemperatureWindow::f(0.5), 2.0);
        assert_eq!(TemperatureWindow::f(1.0) / 2.0, TemperatureWindow::f(0.5));

        assert_eq!(Temperature::f(45.5) + TemperatureWindow::f(1.0), Temperature::f(46.5));
        assert_eq!(Temperature::f(45.5) - TemperatureWindow::f(1.0), Temperature::f(44.5));
        assert_eq!(TemperatureWindow::f(1.0) + Temperature::f(45.5), Temperature::f(46.5));
        assert_eq!(Temperature::c(20.0) + TemperatureWindow::f(1.8), Temperature::c(21.0));
    }

    #[test]
    fn test_zero_window_unit_independent() {
        assert_eq!(TemperatureWindow::ZERO, TemperatureWindow::f(0.0));
        assert_eq!(TemperatureWindow::c(0.0), TemperatureWindow::f(0.0));
        assert!(TemperatureWindow::f(0.0).is_zero());
        assert_eq!("0".parse::<TemperatureWindow>().unwrap(), TemperatureWindow::ZERO);
    }

    #[test]
    fn test_negative_window_rejected() {
        assert!(TemperatureWindow::try_new(-1.0, TemperatureUnit::Celsius).is_err());
        assert!("-1.64F".parse::<TemperatureWindow>().is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("68.5F".parse::<Temperature>().unwrap(), Temperature::f(68.5));
        let celsius: Temperature = "20C".parse().unwrap();
        assert_eq!(celsius.unit(), TemperatureUnit::Celsius);
        assert_eq!(celsius.value(), 20.0);
        assert_eq!("1.5C".parse::<TemperatureWindow>().unwrap(), TemperatureWindow::c(1.5));
        assert!("20K".parse::<Temperature>().is_err());
        assert!("F".parse::<Temperature>().is_err());
        assert!("".parse::<Temperature>().is_err());
    }

    #[test]
    fn test_parse_rejects_odd_symbols() {
        assert!("68°".parse::<Temperature>().is_err());
        assert!("20℃".parse::<Temperature>().is_err());
        assert!("°".parse::<Temperature>().is_err());
        assert!("1.5℉".parse::<TemperatureWindow>().is_err());
    }

    #[test]
    fn test_parse_rejects_non_finite() {
        assert!("NaNF".parse::<Temperature>().is_err());
        assert!("inff".parse::<Temperature>().is_err());
        assert!("-infC".parse::<Temperature>().is_err());
        assert!("NaNC".parse::<TemperatureWindow>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Temperature::f(64.8)).unwrap();
        assert_eq!(json, "\"64.8F\"");
        let back: Temperature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Temperature::f(64.8));
    }

    #[test]
    fn test_difference() {
        let diff = Temperature::f(48.0).difference(&Temperature::f(47.5));
        assert_eq!(diff, TemperatureWindow::f(0.5));
        let reversed = Temperature::f(47.5).difference(&Temperature::f(48.0));
        assert_eq!(reversed, TemperatureWindow::f(0.5));
    }
}
