//! Unit conversions into the engine's common unit system

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn kmh_to_mps(kmh: f64) -> f64 {
    kmh / 3.6
}

pub fn mph_to_mps(mph: f64) -> f64 {
    mph * 0.44704
}

pub fn knots_to_mps(knots: f64) -> f64 {
    knots * 0.514444
}

pub fn inches_to_mm(inches: f64) -> f64 {
    inches * 25.4
}
