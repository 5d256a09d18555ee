//! Static venue tables: broker exchange codes, MICs and lookup exchange
//! codes, each mapped to the quote provider's ticker suffix.

const MIC_SUFFIXES: &[(&str, &str)] = &[
    // US
    ("XNYS", ""),
    ("XNAS", ""),
    ("ARCX", ""),
    ("BATS", ""),
    ("BATY", ""),
    ("EDGX", ""),
    ("EDGA", ""),
    ("IEXG", ""),
    ("XBOS", ""),
    ("XCIS", ""),
    ("XPSX", ""),
    ("MEMX", ""),
    // UK and pan-European venues
    ("XLON", ".L"),
    ("AIMX", ".L"),
    ("JSSI", ".L"),
    ("BATE", ".L"),
    ("CHIX", ".L"),
    ("AQEU", ".L"),
    ("CEUX", ".L"),
    ("EUCC", ".L"),
    // Europe
    ("XPAR", ".PA"),
    ("XETR", ".DE"),
    ("XETRA", ".DE"),
    ("XETA", ".DE"),
    ("XETB", ".DE"),
    ("XFRA", ".F"),
    ("XMAD", ".MC"),
    ("CCEU", ".MC"),
    ("AQXE", ".MC"),
    ("GROW", ".MC"),
    ("HREU", ".MC"),
    ("XMIL", ".MI"),
    ("MTAA", ".MI"),
    ("XAMS", ".AS"),
    ("XSTO", ".ST"),
    ("XHEL", ".HE"),
    ("XCSE", ".CO"),
    ("XOSL", ".OL"),
    ("XWAR", ".WA"),
    ("XPRA", ".PR"),
    ("XBUD", ".BD"),
    ("XBRU", ".BR"),
    ("XLIS", ".LS"),
    ("XWBO", ".VI"),
    ("XSWX", ".SW"),
    // Asia and Oceania
    ("XHKG", ".HK"),
    ("XTKS", ".T"),
    ("XJPX", ".T"),
    ("XSHG", ".SS"),
    ("XSHE", ".SZ"),
    ("XKRX", ".KS"),
    ("XTAI", ".TW"),
    ("XSES", ".SI"),
    ("XASX", ".AX"),
    ("ASXT", ".AX"),
    ("XNZE", ".NZ"),
    // Americas
    ("XTSE", ".TO"),
    ("XTSX", ".V"),
    ("XBOM", ".BO"),
    ("XNSE", ".NS"),
    ("BVMF", ".SA"),
    ("XMEX", ".MX"),
];

/// Unified (IBKR style) exchange codes.
const EXCHANGE_SUFFIXES: &[(&str, &str)] = &[
    ("NASDAQ", ""),
    ("NYSE", ""),
    ("ARCA", ""),
    ("AMEX", ""),
    ("BATS", ""),
    ("LSE", ".L"),
    ("EO", ".L"),
    ("SBF", ".PA"),
    ("IBIS", ".DE"),
    ("BM", ".MC"),
    ("BVME", ".MI"),
    ("AEB", ".AS"),
    ("SFB", ".ST"),
    ("OSE", ".OL"),
    ("CPH", ".CO"),
    ("WSE", ".WA"),
    ("SWX", ".SW"),
    ("VIENNA", ".VI"),
    ("SBEL", ".BR"),
    ("LISBON", ".LS"),
    ("TSE", ".TO"),
    ("TSXV", ".V"),
    ("SEHK", ".HK"),
    ("HKSE", ".HK"),
    ("SGX", ".SI"),
    ("KSE", ".KS"),
    ("TSE.JPN", ".T"),
    ("ASX", ".AX"),
    ("BOVESPA", ".SA"),
    ("BMV", ".MX"),
];

const DEGIRO_EXCHANGES: &[(&str, &str)] = &[
    ("MAD", "BM"),
    ("PAR", "SBF"),
    ("EPA", "SBF"),
    ("FRA", "IBIS"),
    ("XET", "IBIS"),
    ("MIL", "BVME"),
    ("AMS", "AEB"),
    ("EAM", "AEB"),
    ("LSE", "LSE"),
    ("STK", "SFB"),
    ("OMX", "SFB"),
    ("OSL", "OSE"),
    ("CPH", "CPH"),
    ("OMK", "CPH"),
    ("WAR", "WSE"),
    ("WSE", "WSE"),
    ("SWX", "SWX"),
    ("VIE", "VIENNA"),
    ("BRU", "SBEL"),
    ("LIS", "LISBON"),
    ("NDQ", "NASDAQ"),
    ("ASE", "NASDAQ"),
    ("NSY", "NYSE"),
    ("HKG", "SEHK"),
    ("HKS", "SEHK"),
    ("SGX", "SGX"),
    ("TKS", "TSE.JPN"),
    ("ASX", "ASX"),
    ("TSE", "TSE"),
    ("TOR", "TSE"),
    ("TSV", "TSXV"),
    ("TDG", "TRADEGATE"),
];

/// Lookup-service (Bloomberg style) exchange codes.
const FIGI_EXCHANGE_SUFFIXES: &[(&str, &str)] = &[
    ("US", ""),
    ("UN", ""),
    ("UW", ""),
    ("UQ", ""),
    ("UR", ""),
    ("UA", ""),
    ("UP", ""),
    ("LN", ".L"),
    ("SM", ".MC"),
    ("SQ", ".MC"),
    ("FP", ".PA"),
    ("GY", ".DE"),
    ("GR", ".DE"),
    ("GF", ".F"),
    ("IM", ".MI"),
    ("NA", ".AS"),
    ("SS", ".ST"),
    ("FH", ".HE"),
    ("NO", ".OL"),
    ("DC", ".CO"),
    ("PW", ".WA"),
    ("SW", ".SW"),
    ("SE", ".SW"),
    ("AV", ".VI"),
    ("BB", ".BR"),
    ("PL", ".LS"),
    ("HK", ".HK"),
    ("SP", ".SI"),
    ("KS", ".KS"),
    ("JT", ".T"),
    ("JP", ".T"),
    ("AU", ".AX"),
    ("AT", ".AX"),
    ("CN", ".TO"),
    ("CT", ".TO"),
    ("CV", ".V"),
    ("BZ", ".SA"),
    ("MM", ".MX"),
];

/// Minor-unit and alternate currency codes, retried when a lookup with the
/// broker's currency finds nothing.
const CURRENCY_VARIANTS: &[(&str, &str)] = &[
    ("GBX", "GBP"),
    ("GBp", "GBP"),
    ("ZAC", "ZAR"),
    ("ILA", "ILS"),
];

fn find(table: &[(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    let key = key.trim();
    table
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(key))
        .map(|(_, value)| *value)
}

/// DeGiro's three-letter exchange code to the unified code. Codes that are
/// already unified pass through.
pub fn unified_exchange(code: &str) -> Option<&'static str> {
    find(DEGIRO_EXCHANGES, code).or_else(|| {
        EXCHANGE_SUFFIXES
            .iter()
            .find(|(unified, _)| unified.eq_ignore_ascii_case(code.trim()))
            .map(|(unified, _)| *unified)
    })
}

pub fn suffix_for_mic(mic: &str) -> Option<&'static str> {
    find(MIC_SUFFIXES, mic)
}

pub fn suffix_for_exchange(code: &str) -> Option<&'static str> {
    unified_exchange(code).and_then(|unified| find(EXCHANGE_SUFFIXES, unified))
}

pub fn suffix_for_figi_exchange(exch_code: &str) -> Option<&'static str> {
    find(FIGI_EXCHANGE_SUFFIXES, exch_code)
}

/// Suffix priority: MIC, then broker exchange code, then the lookup's own
/// exchange code.
pub fn quote_suffix(
    mic: Option<&str>,
    market_code: Option<&str>,
    figi_exchange: Option<&str>,
) -> Option<&'static str> {
    mic.and_then(suffix_for_mic)
        .or_else(|| market_code.and_then(suffix_for_exchange))
        .or_else(|| figi_exchange.and_then(suffix_for_figi_exchange))
}

pub fn currency_variant(currency: &str) -> Option<&'static str> {
    CURRENCY_VARIANTS
        .iter()
        .find(|(minor, _)| *minor == currency.trim())
        .map(|(_, major)| *major)
}
