//! Shared fixture for hybrid integration tests
//!
//! The switching system is a 1-D chain `x1 .. xK` whose motion between
//! consecutive states is selected by a binary mode `m_k`: "still" (0) or
//! "moving" (1). It carries
//! - a tight prior on `x1 = 0`
//! - one mode-selected between factor per step
//! - one measurement `x_k = k − 1` per state
//! - a uniform prior on `m1` and a transition `m_{k+1} | m_k`

#![allow(dead_code)]

use hybrid_solver::HybridResult;
use hybrid_solver::core::{DiscreteKey, Values, m, x};
use hybrid_solver::discrete::DiscreteConditional;
use hybrid_solver::factors::{BetweenFactor, NoiseModel, NonlinearFactor, PriorFactor};
use hybrid_solver::hybrid::{HybridFactorGraph, NonlinearMixtureFactor};
use nalgebra::dvector;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub struct Switching {
    pub k: usize,
    /// `m1 .. m(K−1)`, binary
    pub modes: Vec<DiscreteKey>,
    pub nonlinear_factor_graph: HybridFactorGraph,
    /// `x_k = k`
    pub linearization_point: Values,
    pub linearized_factor_graph: HybridFactorGraph,
}

impl Switching {
    pub fn new(k: usize) -> HybridResult<Self> {
        Self::with_sigmas(k, 1.0, 0.1)
    }

    pub fn with_sigmas(k: usize, between_sigma: f64, prior_sigma: f64) -> HybridResult<Self> {
        let modes: Vec<DiscreteKey> = (1..k as u64).map(|i| DiscreteKey::new(m(i), 2)).collect();
        let mut graph = HybridFactorGraph::new();

        graph.push_back(NonlinearFactor::new(
            vec![x(1)],
            PriorFactor::scalar(0.0),
            NoiseModel::isotropic(1, prior_sigma)?,
        )?);

        let motion = NoiseModel::isotropic(1, between_sigma)?;
        for (i, mode) in modes.iter().enumerate() {
            let (from, to) = (x(i as u64 + 1), x(i as u64 + 2));
            graph.push_back(NonlinearMixtureFactor::new(
                vec![*mode],
                vec![
                    NonlinearFactor::new(vec![from, to], BetweenFactor::scalar(0.0), motion.clone())?,
                    NonlinearFactor::new(vec![from, to], BetweenFactor::scalar(1.0), motion.clone())?,
                ],
            )?);
        }

        let measurement = NoiseModel::isotropic(1, 0.1)?;
        for i in 1..=k as u64 {
            graph.push_back(NonlinearFactor::new(
                vec![x(i)],
                PriorFactor::scalar(i as f64 - 1.0),
                measurement.clone(),
            )?);
        }

        if let Some(first) = modes.first() {
            graph.push_back(DiscreteConditional::from_spec(*first, &[], "1/1")?);
        }
        for pair in modes.windows(2) {
            graph.push_back(DiscreteConditional::from_spec(pair[1], &[pair[0]], "1/2 3/2")?);
        }

        let linearization_point: Values =
            (1..=k as u64).map(|i| (x(i), dvector![i as f64])).collect();
        let linearized_factor_graph = graph.linearize(&linearization_point)?;

        Ok(Switching {
            k,
            modes,
            nonlinear_factor_graph: graph,
            linearization_point,
            linearized_factor_graph,
        })
    }

    /// The Gaussian and Gaussian-mixture part of the linearized graph.
    pub fn continuous_graph(&self) -> HybridFactorGraph {
        let mut graph = HybridFactorGraph::new();
        for f in self.linearized_factor_graph.gaussian_graph() {
            graph.push_gaussian(f.clone());
        }
        for f in self.linearized_factor_graph.hybrid_graph() {
            graph.push_mixture(f.clone());
        }
        graph
    }
}
