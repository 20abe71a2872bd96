//! Background subtraction and resonance fitting for frequency sweeps of a
//! quartz tuning fork.
//!
//! A wide sweep, with the resonance excluded by a sample window, defines cubic (X)
//! and quartic (Y) background polynomials. The short sweep is measured against that
//! background, corrected, and fitted with a driven damped oscillator response.
pub mod analysis;
pub mod config;
pub mod session;
