//! Gauss-Legendre quadrature rules.
//!
//! Nodes are the roots of the Legendre polynomial `P_n`, found by Newton
//! iteration from the Tricomi guesses; an n-point rule integrates polynomials
//! up to degree `2n - 1` exactly. The transform layer evaluates the
//! correlation-distortion double integral on the tensor product of one of
//! these rules.

/// Fixed-order Gauss-Legendre rule on `[-1, 1]`.
///
/// # Example
///
/// ```
/// use uq_core::math::quadrature::GaussLegendre;
///
/// let rule = GaussLegendre::new(16);
/// let integral = rule.integrate(0.0, 1.0, |x| x.exp());
/// assert!((integral - (1.0f64.exp() - 1.0)).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Build an `n`-point rule. Panics when `n` is zero.
    pub fn new(n: usize) -> Self {
        assert!(n >= 1, "quadrature rule needs at least one point");

        let mut nodes = vec![0.0; n];
        let mut weights = vec![0.0; n];

        // The rule is symmetric; solve the positive half and mirror.
        let half = (n + 1) / 2;
        for i in 0..half {
            let mut x =
                (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            let mut slope = 1.0;
            for _ in 0..100 {
                let (value, derivative) = legendre_with_derivative(n, x);
                slope = derivative;
                let delta = value / derivative;
                x -= delta;
                if delta.abs() < 1e-15 {
                    break;
                }
            }
            let weight = 2.0 / ((1.0 - x * x) * slope * slope);
            nodes[i] = -x;
            nodes[n - 1 - i] = x;
            weights[i] = weight;
            weights[n - 1 - i] = weight;
        }

        Self { nodes, weights }
    }

    /// Number of points in the rule.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the rule has no points.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes on `[-1, 1]` in ascending order.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Weights matching [`GaussLegendre::nodes`].
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Nodes and weights affinely mapped onto `[a, b]`.
    pub fn scaled(&self, a: f64, b: f64) -> (Vec<f64>, Vec<f64>) {
        let shift = 0.5 * (a + b);
        let half_width = 0.5 * (b - a);
        let nodes = self.nodes.iter().map(|&t| shift + half_width * t).collect();
        let weights = self.weights.iter().map(|&w| w * half_width).collect();
        (nodes, weights)
    }

    /// Integrate `f` over `[a, b]`.
    pub fn integrate<F>(&self, a: f64, b: f64, f: F) -> f64
    where
        F: Fn(f64) -> f64,
    {
        let shift = 0.5 * (a + b);
        let half_width = 0.5 * (b - a);
        let sum: f64 = self
            .nodes
            .iter()
            .zip(&self.weights)
            .map(|(&t, &w)| w * f(shift + half_width * t))
            .sum();
        half_width * sum
    }
}

/// Evaluate `P_n(x)` and its derivative by the three-term recurrence.
fn legendre_with_derivative(n: usize, x: f64) -> (f64, f64) {
    let mut previous = 1.0;
    let mut current = x;
    for k in 2..=n {
        let k = k as f64;
        let next = ((2.0 * k - 1.0) * x * current - (k - 1.0) * previous) / k;
        previous = current;
        current = next;
    }
    if n == 0 {
        return (1.0, 0.0);
    }
    let derivative = (n as f64) * (x * current - previous) / (x * x - 1.0);
    (current, derivative)
}
