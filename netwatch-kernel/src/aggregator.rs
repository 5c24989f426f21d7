/*!
 * AGRÉGATEUR DE STATUT - Historique d'observations → statut courant par hôte
 *
 * RÔLE :
 * Réconcilie l'historique append-only d'un hôte en une seule ligne "courante".
 *
 * STRATÉGIES :
 * - `Latest`   : ligne la plus récente par alias (quel que soit l'état)
 * - `Windowed` : premier SYN_SENT après le dernier ESTABLISHED, sinon ligne la plus récente
 *
 * ORDRE :
 * Toutes les comparaisons utilisent `(timestamp, id)`. À timestamp égal, l'id le plus
 * grand est le plus récent, l'id le plus petit est le premier.
 */

use netwatch_common::{ConnectionState, Observation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    Latest,
    #[default]
    Windowed,
}

impl fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Windowed => f.write_str("windowed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusAggregator {
    strategy: AggregationStrategy,
}

impl StatusAggregator {
    pub fn new(strategy: AggregationStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    /// Statut courant d'un hôte; `history` ne contient que les lignes de cet hôte
    pub fn current_status(&self, history: &[Observation]) -> Option<Observation> {
        match self.strategy {
            AggregationStrategy::Latest => latest_any(history).cloned(),
            AggregationStrategy::Windowed => first_syn_sent_after_established(history)
                .or_else(|| latest_any(history))
                .cloned(),
        }
    }

    /// Statut courant de tous les hôtes présents dans l'historique (au plus une ligne par alias)
    pub fn aggregate(&self, history: Vec<Observation>) -> Vec<Observation> {
        match self.strategy {
            AggregationStrategy::Latest => latest_per_alias(history),
            AggregationStrategy::Windowed => {
                let mut per_host: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
                for obs in history {
                    per_host.entry(obs.host_alias.clone()).or_default().push(obs);
                }
                // BTreeMap → alias croissant
                per_host
                    .values()
                    .filter_map(|rows| self.current_status(rows))
                    .collect()
            }
        }
    }
}

fn latest_any(history: &[Observation]) -> Option<&Observation> {
    history.iter().max_by_key(|o| o.order_key())
}

fn first_syn_sent_after_established(history: &[Observation]) -> Option<&Observation> {
    let last_established = history
        .iter()
        .filter(|o| o.state == ConnectionState::Established)
        .map(Observation::order_key)
        .max();

    history
        .iter()
        .filter(|o| o.state == ConnectionState::SynSent)
        .filter(|o| last_established.map_or(true, |cutoff| o.order_key() > cutoff))
        .min_by_key(|o| o.order_key())
}

/// Tri décroissant puis premier alias rencontré
fn latest_per_alias(mut history: Vec<Observation>) -> Vec<Observation> {
    history.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
    let mut seen = HashSet::new();
    history.retain(|o| seen.insert(o.host_alias.clone()));
    history
}
