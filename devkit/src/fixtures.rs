/*!
Fixtures pour scénarios de tests

- `HistoryBuilder`: construit un historique horodaté (ids croissants, offsets en secondes)
- Sorties `netstat` réalistes avec ou sans ligne "master"
*/

use chrono::{DateTime, Duration, TimeZone, Utc};
use netwatch_common::{ConnectionState, Observation};

/// Construit des lignes d'historique avec horodatage contrôlé
pub struct HistoryBuilder {
    base: DateTime<Utc>,
    next_id: i64,
    rows: Vec<Observation>,
}

impl HistoryBuilder {
    pub fn new() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now))
    }

    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self { base, next_id: 1, rows: Vec::new() }
    }

    /// Ajoute une ligne `offset_secs` secondes après la base
    pub fn at(mut self, alias: &str, offset_secs: i64, state: ConnectionState) -> Self {
        let peer = match state {
            ConnectionState::Established | ConnectionState::SynSent => "10.0.0.9:7000-master",
            _ => "",
        };
        self.rows.push(Observation {
            id: self.next_id,
            recorded_at: self.base + Duration::seconds(offset_secs),
            host_alias: alias.to_string(),
            host_address: format!("10.0.0.{}", self.next_id % 250 + 1),
            peer_address: peer.to_string(),
            state,
        });
        self.next_id += 1;
        self
    }

    /// Timestamp absolu correspondant à un offset (pour les assertions)
    pub fn time_of(&self, offset_secs: i64) -> DateTime<Utc> {
        self.base + Duration::seconds(offset_secs)
    }

    pub fn build(self) -> Vec<Observation> {
        self.rows
    }
}

impl Default for HistoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sortie netstat contenant une ligne master dans l'état donné
pub fn netstat_with_master(state: &str) -> String {
    format!(
        "Active Internet connections (w/o servers)\n\
         Proto Recv-Q Send-Q Local Address           Foreign Address         State\n\
         tcp        0      0 10.0.0.5:22             10.0.0.77:51234         ESTABLISHED\n\
         tcp        0      0 10.0.0.5:5000           10.0.0.9:7000-master    {state}\n\
         tcp        0      0 10.0.0.5:5001           10.0.0.10:7000-master   ESTABLISHED\n"
    )
}

/// Sortie netstat sans aucune ligne master
pub fn netstat_without_master() -> String {
    "Active Internet connections (w/o servers)\n\
     Proto Recv-Q Send-Q Local Address           Foreign Address         State\n\
     tcp        0      0 10.0.0.5:22             10.0.0.77:51234         ESTABLISHED\n\
     udp        0      0 10.0.0.5:123            0.0.0.0:*\n"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_ids_and_offsets() {
        let builder = HistoryBuilder::new().at("A", 10, ConnectionState::Established);
        let t10 = builder.time_of(10);
        let rows = builder.at("A", 5, ConnectionState::SynSent).build();
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[1].id, 2);
        assert_eq!(rows[0].recorded_at, t10);
        assert!(rows[1].recorded_at < rows[0].recorded_at);
    }

    #[test]
    fn test_netstat_fixtures() {
        assert!(netstat_with_master("SYN_SENT").contains("7000-master    SYN_SENT"));
        assert!(!netstat_without_master().contains("master"));
    }
}
