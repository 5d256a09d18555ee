mod config;
mod detector;
mod openfigi;
mod parsers;
mod utils;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::{
    api::{FigiCandidate, IdentityLookup, MappingJob},
    cache::Clock,
    config::Config,
    db,
    errors::ResolveError,
};

pub(crate) const DEGIRO_TRANSACTIONS: &str = "\
Fecha,Hora,Producto,ISIN,Bolsa de,Centro de ejecución,Número,Precio,,Valor local,,Valor,,Tipo de cambio,Costes de transacción,,Total,,ID Orden
01-03-2024,09:05,BANCO SANTANDER,ES0113900J37,MAD,XMAD,100,\"3,50\",EUR,\"-350,00\",EUR,\"-350,00\",EUR,,\"-2,00\",EUR,\"-352,00\",EUR,abc-123
15-03-2024,10:00,BANCO SANTANDER,ES0113900J37,MAD,XMAD,-40,\"4,00\",EUR,\"160,00\",EUR,\"160,00\",EUR,,\"-2,00\",EUR,\"158,00\",EUR,def-456
20-03-2024,10:00,BANCO SANTANDER,ES0113900J37,MAD,XMAD,2,\"0,00\",EUR,\"0,00\",EUR,\"0,00\",EUR,,,,\"0,00\",EUR,
32-13-2024,10:00,BANCO SANTANDER,ES0113900J37,MAD,XMAD,5,\"3,00\",EUR,\"-15,00\",EUR,\"-15,00\",EUR,,,,\"-15,00\",EUR,
21-03-2024,10:00,BANCO SANTANDER,ES0113900J37,MAD,XMAD,0,\"3,00\",EUR,\"0,00\",EUR,\"0,00\",EUR,,,,\"0,00\",EUR,
";

pub(crate) const IBKR_STATEMENT: &str = "\
Statement,Header,Field Name,Field Value
Statement,Data,BrokerName,Interactive Brokers
Trades,Header,DataDiscriminator,Asset Category,Currency,Symbol,Date/Time,Quantity,T. Price,Proceeds,Comm/Fee
Trades,Data,Order,Stocks,USD,AAPL,\"2024-01-15, 10:30:00\",10,150,-1500,-1
Trades,Data,Order,Forex,EUR,EUR.USD,\"2024-01-16, 10:30:00\",\"1,000\",1.09,-1090,-2
Trades,SubTotal,,Stocks,USD,AAPL,,10,,-1500,-1
Dividends,Header,Currency,Date,Description,Amount
Dividends,Data,USD,2024-02-15,AAPL(US0378331005) Cash Dividend USD 0.24 per Share (Ordinary Dividend),2.4
Dividends,Data,Total,,,2.4
Withholding Tax,Header,Currency,Date,Description,Amount,Code
Withholding Tax,Data,USD,2024-02-15,AAPL(US0378331005) Cash Dividend USD 0.24 per Share - US Tax,-0.36,
Deposits & Withdrawals,Header,Currency,Settle Date,Description,Amount
Deposits & Withdrawals,Data,EUR,2024-01-02,Electronic Fund Transfer,\"2,000\"
Deposits & Withdrawals,Data,Total,,,\"2,000\"
Open Positions,Header,DataDiscriminator,Asset Category,Currency,Symbol,Quantity,Mult,Cost Price,Cost Basis
Open Positions,Data,Summary,Stocks,USD,AAPL,10,1,150.1,1501
Financial Instrument Information,Header,Asset Category,Symbol,Description,Conid,Security ID,Listing Exch,Multiplier,Type
Financial Instrument Information,Data,Stocks,AAPL,APPLE INC,265598,US0378331005,NASDAQ,1,COMMON
";

pub(crate) const REVOLUT_X: &str = "\
Symbol,Type,Quantity,Price,Value,Fees,Date
BTC,Buy,0.01,\"€40,000.00\",€400.00,€1.00,\"5 Ene 2024, 14:02:11\"
BTC,Sell,0.004,\"€45,000.00\",€180.00,€0.50,\"10 Feb 2024, 09:00:00\"
ETH,Staking reward,0.1,,,,\"12 Mar 2024, 08:00:00\"
BTC,Transfer,0.5,,,,\"13 Mar 2024, 08:00:00\"
";

pub(crate) async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let pool = db::init::connect(path.to_str().unwrap()).await.unwrap();
    (dir, pool)
}

pub(crate) fn offline_config() -> Config {
    Config {
        enable_enrichment: false,
        ..Config::default()
    }
}

pub(crate) fn candidate(ticker: &str, exch_code: &str, mic_code: Option<&str>) -> FigiCandidate {
    FigiCandidate::new(
        Some(ticker.to_string()),
        Some(exch_code.to_string()),
        mic_code.map(str::to_string),
        Some(format!("{} name", ticker)),
        Some(String::from("Common Stock")),
    )
}

#[derive(Clone, Debug)]
pub(crate) enum Scripted {
    Candidates(Vec<FigiCandidate>),
    RateLimited,
    Http(u16),
}

/// Lookup fake answering from a table keyed by (ISIN, currency filter).
/// Unscripted jobs answer with no candidates.
#[derive(Default)]
pub(crate) struct ScriptedLookup {
    responses: Mutex<HashMap<(String, Option<String>), Scripted>>,
    calls: Mutex<Vec<MappingJob>>,
}

impl ScriptedLookup {
    pub(crate) fn script(&self, isin: &str, currency: Option<&str>, response: Scripted) {
        self.responses
            .lock()
            .unwrap()
            .insert((isin.to_string(), currency.map(str::to_string)), response);
    }

    pub(crate) fn calls(&self) -> Vec<MappingJob> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityLookup for ScriptedLookup {
    async fn lookup(&self, job: &MappingJob) -> Result<Vec<FigiCandidate>, ResolveError> {
        self.calls.lock().unwrap().push(job.clone());
        let key = (job.id_value().clone(), job.currency().clone());
        let response = self.responses.lock().unwrap().get(&key).cloned();
        match response {
            Some(Scripted::Candidates(candidates)) => Ok(candidates),
            Some(Scripted::RateLimited) => Err(ResolveError::RateLimited(3)),
            Some(Scripted::Http(status)) => Err(ResolveError::Http(status)),
            None => Ok(Vec::new()),
        }
    }
}

pub(crate) fn scripted() -> Arc<ScriptedLookup> {
    Arc::new(ScriptedLookup::default())
}

pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
