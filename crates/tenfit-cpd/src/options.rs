//! Configuration of the damped Gauss-Newton driver
//!
//! [`DgnOptions`] carries every recognised option with its default value.
//! It is read-only for the whole run.

use std::fmt;
use std::str::FromStr;

use crate::error::{CpdError, CpdResult};

/// Inner solver used to compute one outer step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum InnerMethod {
    /// Preconditioned CG with a randomized budget growing with the outer iteration
    Cg,
    /// Preconditioned CG with the fixed budget `cg_maxiter`
    CgStatic,
    /// One cyclic sweep of per-mode least-squares updates
    Als,
}

impl InnerMethod {
    pub fn name(&self) -> &'static str {
        match self {
            InnerMethod::Cg => "cg",
            InnerMethod::CgStatic => "cg_static",
            InnerMethod::Als => "als",
        }
    }
}

impl FromStr for InnerMethod {
    type Err = CpdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cg" => Ok(InnerMethod::Cg),
            "cg_static" => Ok(InnerMethod::CgStatic),
            "als" => Ok(InnerMethod::Als),
            other => Err(CpdError::UnknownInnerMethod(other.to_string())),
        }
    }
}

impl TryFrom<String> for InnerMethod {
    type Error = CpdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InnerMethod> for String {
    fn from(method: InnerMethod) -> Self {
        method.name().to_string()
    }
}

impl fmt::Display for InnerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inner method for every outer iteration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InnerMethods {
    /// Same method on every iteration
    Single(InnerMethod),
    /// Method per iteration; the last entry is reused past the end
    PerIteration(Vec<InnerMethod>),
}

impl InnerMethods {
    /// Method used on outer iteration `iteration`
    pub fn at(&self, iteration: usize) -> InnerMethod {
        match self {
            InnerMethods::Single(method) => *method,
            InnerMethods::PerIteration(methods) => methods
                .get(iteration)
                .or_else(|| methods.last())
                .copied()
                .unwrap_or(InnerMethod::Cg),
        }
    }
}

/// Damping parameter policy
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Damping {
    /// Initial damping `c · mean(|T|)`, then adapted by the gain ratio
    Scaled(f64),
    /// Damping per iteration; the last entry is reused past the end. Not adapted.
    Schedule(Vec<f64>),
}

impl Damping {
    /// Damping of the first iteration
    pub fn initial(&self, mean_abs: f64) -> f64 {
        match self {
            Damping::Scaled(c) => c * mean_abs,
            Damping::Schedule(values) => values.first().copied().unwrap_or(0.0),
        }
    }

    /// Scheduled damping for `iteration`, `None` for the adaptive policy
    pub fn scheduled(&self, iteration: usize) -> Option<f64> {
        match self {
            Damping::Scaled(_) => None,
            Damping::Schedule(values) => values.get(iteration).or_else(|| values.last()).copied(),
        }
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self, Damping::Scaled(_))
    }
}

/// Box constraints on factor entries
///
/// Inactive unless `low < upp`. With `factor == 0` entries are clamped to
/// `[low, upp]`; with `factor > 0` out-of-range entries are squashed back
/// through a sigmoid of slope `factor`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraints {
    pub low: f64,
    pub upp: f64,
    pub factor: f64,
}

impl Constraints {
    pub fn new(low: f64, upp: f64, factor: f64) -> Self {
        Self { low, upp, factor }
    }

    pub fn is_active(&self) -> bool {
        self.low < self.upp
    }
}

/// Options of [`crate::dgn`]
///
/// # Examples
///
/// ```
/// use tenfit_cpd::{DgnOptions, InnerMethod};
///
/// let options = DgnOptions::default()
///     .with_maxiter(50)
///     .with_tol(1e-10)
///     .with_inner_method(InnerMethod::CgStatic)
///     .with_cg_maxiter(20);
/// assert_eq!(options.inner_method.at(3), InnerMethod::CgStatic);
///
/// assert!(DgnOptions::default().with_inner_method_name("bogus").is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DgnOptions {
    /// Outer iteration cap
    pub maxiter: usize,
    /// Relative error threshold
    pub tol: f64,
    /// Relative step size threshold
    pub tol_step: f64,
    /// Improvement threshold, also used by the error-plateau rule
    pub tol_improv: f64,
    /// Gradient infinity-norm threshold
    pub tol_grad: f64,
    pub init_damp: Damping,
    pub inner_method: InnerMethods,
    /// Fixed inner budget for `cg_static`
    pub cg_maxiter: usize,
    /// Multiplier of the randomized `cg` budget
    pub cg_factor: f64,
    /// CG residual threshold
    pub cg_tol: f64,
    /// Force all factors equal after each step
    pub symm: bool,
    /// Verbosity: above 1 every iteration is logged at info level
    pub display: u8,
    pub constraints: Constraints,
    /// Cap on balanced column norms; 0 disables balancing
    pub factors_norm: f64,
    /// Seed of the randomized `cg` budget; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for DgnOptions {
    fn default() -> Self {
        Self {
            maxiter: 200,
            tol: 1e-6,
            tol_step: 1e-6,
            tol_improv: 1e-6,
            tol_grad: 1e-6,
            init_damp: Damping::Scaled(1.0),
            inner_method: InnerMethods::Single(InnerMethod::Cg),
            cg_maxiter: 100,
            cg_factor: 1.0,
            cg_tol: 1e-16,
            symm: false,
            display: 0,
            constraints: Constraints::default(),
            factors_norm: 0.0,
            seed: None,
        }
    }
}

impl DgnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_tol_step(mut self, tol_step: f64) -> Self {
        self.tol_step = tol_step;
        self
    }

    pub fn with_tol_improv(mut self, tol_improv: f64) -> Self {
        self.tol_improv = tol_improv;
        self
    }

    pub fn with_tol_grad(mut self, tol_grad: f64) -> Self {
        self.tol_grad = tol_grad;
        self
    }

    /// Adaptive damping starting at `c · mean(|T|)`
    ///
    /// The gain-ratio rule multiplies the damping by 1.5 after every step
    /// that matches its error model. On small, nearly exact problems the
    /// default `c = 1` can therefore grow the damping faster than the error
    /// shrinks, and the run ends on the step-size rule around 1e-6. Start
    /// with `c ≈ 1e-3` to reach `tol` there.
    pub fn with_init_damp(mut self, c: f64) -> Self {
        self.init_damp = Damping::Scaled(c);
        self
    }

    /// Fixed damping per iteration; iterations 0 and 1 use `schedule[0]`,
    /// iteration k ≥ 1 uses `schedule[k − 1]`
    pub fn with_damping_schedule(mut self, schedule: Vec<f64>) -> Self {
        self.init_damp = Damping::Schedule(schedule);
        self
    }

    pub fn with_inner_method(mut self, method: InnerMethod) -> Self {
        self.inner_method = InnerMethods::Single(method);
        self
    }

    pub fn with_inner_methods(mut self, methods: Vec<InnerMethod>) -> Self {
        self.inner_method = InnerMethods::PerIteration(methods);
        self
    }

    /// Select the inner method by name.
    ///
    /// # Errors
    ///
    /// [`CpdError::UnknownInnerMethod`] unless `name` is `"cg"`,
    /// `"cg_static"` or `"als"`.
    pub fn with_inner_method_name(self, name: &str) -> CpdResult<Self> {
        let method = name.parse::<InnerMethod>()?;
        Ok(self.with_inner_method(method))
    }

    pub fn with_cg_maxiter(mut self, cg_maxiter: usize) -> Self {
        self.cg_maxiter = cg_maxiter;
        self
    }

    pub fn with_cg_factor(mut self, cg_factor: f64) -> Self {
        self.cg_factor = cg_factor;
        self
    }

    pub fn with_cg_tol(mut self, cg_tol: f64) -> Self {
        self.cg_tol = cg_tol;
        self
    }

    pub fn with_symmetric(mut self, symm: bool) -> Self {
        self.symm = symm;
        self
    }

    pub fn with_display(mut self, display: u8) -> Self {
        self.display = display;
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_factors_norm(mut self, factors_norm: f64) -> Self {
        self.factors_norm = factors_norm;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check option values that do not depend on the tensor.
    ///
    /// # Errors
    ///
    /// [`CpdError::InvalidOption`] naming the first offending field.
    pub fn validate(&self) -> CpdResult<()> {
        if self.maxiter == 0 {
            return Err(invalid("maxiter must be at least 1"));
        }
        for (name, value) in [
            ("tol", self.tol),
            ("tol_step", self.tol_step),
            ("tol_improv", self.tol_improv),
            ("tol_grad", self.tol_grad),
            ("cg_tol", self.cg_tol),
            ("factors_norm", self.factors_norm),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if !self.cg_factor.is_finite() || self.cg_factor <= 0.0 {
            return Err(invalid(format!(
                "cg_factor must be finite and positive, got {}",
                self.cg_factor
            )));
        }
        if self.cg_maxiter == 0 {
            return Err(invalid("cg_maxiter must be at least 1"));
        }

        match &self.init_damp {
            Damping::Scaled(c) if !c.is_finite() || *c < 0.0 => {
                return Err(invalid(format!(
                    "init_damp must be finite and non-negative, got {}",
                    c
                )));
            }
            Damping::Schedule(values) if values.is_empty() => {
                return Err(invalid("damping schedule must not be empty"));
            }
            Damping::Schedule(values) if values.iter().any(|v| !v.is_finite() || *v < 0.0) => {
                return Err(invalid(
                    "damping schedule entries must be finite and non-negative",
                ));
            }
            _ => {}
        }

        if let InnerMethods::PerIteration(methods) = &self.inner_method {
            if methods.is_empty() {
                return Err(invalid("per-iteration inner methods must not be empty"));
            }
        }

        let Constraints { low, upp, factor } = self.constraints;
        if !low.is_finite() || !upp.is_finite() || !factor.is_finite() || factor < 0.0 {
            return Err(invalid(format!(
                "constraints must be finite with factor >= 0, got {:?}",
                self.constraints
            )));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> CpdError {
    CpdError::InvalidOption(message.into())
}
