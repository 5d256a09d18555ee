#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::{
        errors::ParseError,
        models::{AssetType, FormatTag, HintBasis, TransactionType},
        parsers::{decode, parse_bytes},
        test::{DEGIRO_TRANSACTIONS, IBKR_STATEMENT, REVOLUT_X},
    };

    const DEGIRO_STATEMENT: &str = "\
Fecha,Hora,Fecha valor,Producto,ISIN,Descripción,Tipo,Variación,,Saldo,,ID Orden
02-04-2024,08:00,01-04-2024,APPLE INC,US0378331005,Dividendo,,USD,\"2,40\",USD,\"2,40\",
02-04-2024,08:00,01-04-2024,APPLE INC,US0378331005,Retención del dividendo,,USD,\"-0,36\",USD,\"2,04\",
03-04-2024,09:00,03-04-2024,,,Ingreso,,EUR,\"1000,00\",EUR,\"1000,00\",
05-04-2024,10:00,05-04-2024,BANCO SANTANDER,ES0113900J37,\"Compra 10 Banco Santander@3,5 EUR (ES0113900J37)\",,EUR,\"-35,00\",EUR,\"965,00\",abc
06-04-2024,10:00,06-04-2024,,,Comisión de conectividad con el mercado 2024,,EUR,\"-2,50\",EUR,\"962,50\",
07-04-2024,10:00,07-04-2024,,,Something odd,,EUR,\"1,00\",EUR,\"963,50\",
";

    const IBKR_SPANISH: &str = "\
Extracto,Header,Nombre del campo,Valor del campo
Extracto,Data,BrokerName,Interactive Brokers
Información sobre la cuenta,Header,Nombre del campo,Valor del campo
Información sobre la cuenta,Data,Divisa base,EUR
Operaciones,Header,DataDiscriminator,Categoría de activo,Divisa,Símbolo,Fecha/Hora,Cantidad,Precio trans.,Productos,Tarifa/com.
Operaciones,Data,Order,Acciones,EUR,SAN,\"2024-03-01, 09:05:00\",100,3.5,-350,-2
Operaciones,Data,Order,Acciones,EUR,SAN,\"2024-03-15, 10:00:00\",-40,4,160,-2
Operaciones,Data,Order,Divisas,EUR,EUR.USD,\"2024-03-16, 10:30:00\",\"1,000\",1.09,-1090,-2
Operaciones,SubTotal,,Acciones,EUR,SAN,,60,,-190,-4
Dividendos,Header,Divisa,Fecha,Descripción,Cantidad
Dividendos,Data,EUR,2024-04-30,SAN(ES0113900J37) Dividendo en efectivo EUR 0.095 por acción (Ordinario),5.7
Dividendos,Data,Total,,,5.7
Retención de impuestos,Header,Divisa,Fecha,Descripción,Cantidad,Código
Retención de impuestos,Data,EUR,2024-04-30,SAN(ES0113900J37) Dividendo en efectivo EUR 0.095 por acción - ES Impuesto,-1.08,
Depósitos y retiradas,Header,Divisa,Fecha de liquidación,Descripción,Cantidad
Depósitos y retiradas,Data,EUR,2024-02-28,Transferencia electrónica de fondos,\"1,000\"
Depósitos y retiradas,Data,Total,,,\"1,000\"
Tarifas,Header,Subtitle,Divisa,Fecha,Descripción,Cantidad
Tarifas,Data,Otras tarifas,EUR,2024-03-31,Tarifa de datos de mercado,-1.5
Tarifas,Data,Total,,,,-1.5
Posiciones abiertas,Header,DataDiscriminator,Categoría de activo,Divisa,Símbolo,Cantidad,Mult,Precio de coste,Base de coste
Posiciones abiertas,Data,Summary,Acciones,EUR,SAN,60,1,3.54,212.4
Información de instrumento financiero,Header,Categoría de activo,Símbolo,Descripción,Conid,ID de seguridad,Merc. de cotización,Multiplicador,Tipo
Información de instrumento financiero,Data,Acciones,SAN,BANCO SANTANDER SA,12087792,ES0113900J37,BME,1,COMÚN
";

    const REVOLUT_FIAT: &str = "\
Type,Product,Started Date,Completed Date,Description,Amount,Fee,Currency,State,Balance
TOPUP,Current,2024-01-02 10:00:00,2024-01-02 10:00:05,Top-up by *1234,500.00,0.00,EUR,COMPLETED,500.00
CARD_PAYMENT,Current,2024-01-03 12:00:00,2024-01-04 09:00:00,Amazon,-20.00,0.00,EUR,COMPLETED,480.00
TRANSFER,Current,2024-01-05 12:00:00,2024-01-05 12:00:01,To broker,-100.00,0.00,EUR,COMPLETED,380.00
TRANSFER,Current,2024-01-06 12:00:00,2024-01-06 12:00:01,From savings,50.00,0.00,EUR,COMPLETED,430.00
FEE,Current,2024-01-07 12:00:00,2024-01-07 12:00:00,Plan fee,-2.99,0.00,EUR,COMPLETED,427.01
INTEREST,Savings,2024-01-08 12:00:00,2024-01-08 12:00:00,Interest earned,0.50,0.00,EUR,COMPLETED,427.51
TOPUP,Current,2024-01-09 12:00:00,,Top-up by *1234,100.00,0.00,EUR,REVERTED,427.51
EXCHANGE,Current,2024-01-10 12:00:00,2024-01-10 12:00:00,Exchanged to USD,-50.00,0.00,EUR,COMPLETED,377.51
ATM,Current,2024-01-11 12:00:00,2024-01-11 12:00:00,Cash withdrawal,-50.00,1.00,EUR,COMPLETED,326.51
WEIRD,Current,2024-01-12 12:00:00,2024-01-12 12:00:00,Unknown,1.00,0.00,EUR,COMPLETED,327.51
";

    fn at(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn degiro_transactions() {
        let statement = parse_bytes(DEGIRO_TRANSACTIONS.as_bytes()).unwrap();
        assert_eq!(statement.format, FormatTag::Degiro);
        assert_eq!(statement.records.len(), 3);
        assert_eq!(statement.warnings.len(), 2);

        let buy = &statement.records[0];
        assert_eq!(buy.transaction_type, TransactionType::Buy);
        assert_eq!(buy.date, at(2024, 3, 1, 9, 5, 0));
        assert_eq!(buy.quantity, Some(dec!(100)));
        assert_eq!(buy.price, Some(dec!(3.5)));
        assert_eq!(buy.amount, dec!(-350));
        assert_eq!(buy.commission, dec!(2));
        assert_eq!(buy.external_id.as_deref(), Some("abc-123"));
        let instrument = buy.instrument.as_ref().unwrap();
        assert_eq!(instrument.isin.as_deref(), Some("ES0113900J37"));
        assert_eq!(instrument.market_code.as_deref(), Some("MAD"));
        assert_eq!(instrument.mic.as_deref(), Some("XMAD"));
        assert_eq!(instrument.currency, "EUR");

        let sell = &statement.records[1];
        assert_eq!(sell.transaction_type, TransactionType::Sell);
        assert_eq!(sell.quantity, Some(dec!(40)));
        assert_eq!(sell.amount, dec!(160));

        let reward = &statement.records[2];
        assert_eq!(reward.transaction_type, TransactionType::StakingReward);
        assert_eq!(reward.amount, Decimal::ZERO);

        assert_eq!(statement.holdings_hint.len(), 1);
        assert_eq!(statement.holdings_hint[0].quantity, dec!(62));
    }

    #[test]
    fn degiro_statement_cash_lines() {
        let statement = parse_bytes(DEGIRO_STATEMENT.as_bytes()).unwrap();
        assert_eq!(statement.format, FormatTag::Degiro);

        let types: Vec<TransactionType> = statement
            .records
            .iter()
            .map(|record| record.transaction_type)
            .collect();
        assert_eq!(
            types,
            vec![
                TransactionType::Dividend,
                TransactionType::Dividend,
                TransactionType::Deposit,
                TransactionType::Fee,
            ]
        );

        let dividend = &statement.records[0];
        assert_eq!(dividend.amount, dec!(2.4));
        assert_eq!(dividend.currency, "USD");
        assert_eq!(
            dividend.instrument.as_ref().unwrap().isin.as_deref(),
            Some("US0378331005")
        );

        let withholding = &statement.records[1];
        assert_eq!(withholding.amount, dec!(-0.36));
        assert_eq!(withholding.tax, dec!(0.36));

        assert_eq!(statement.records[2].amount, dec!(1000));
        assert!(statement.records[2].instrument.is_none());
        assert_eq!(statement.records[3].amount, dec!(-2.5));

        // one unsupported line, one summary for the ignored trade line
        assert_eq!(statement.warnings.len(), 2);
        assert!(statement.holdings_hint.is_empty());
    }

    #[test]
    fn degiro_with_wrong_delimiter_is_fatal() {
        let text = "Fecha;Hora;Producto;ISIN;Bolsa de;Centro de ejecución;Número;Precio\n01-03-2024;09:05;X;ES0113900J37;MAD;XMAD;1;1\n";
        let error = parse_bytes(text.as_bytes()).unwrap_err();
        assert!(matches!(
            error,
            ParseError::Structure {
                format: FormatTag::Degiro,
                ..
            }
        ));
    }

    #[test]
    fn ibkr_sections() {
        let statement = parse_bytes(IBKR_STATEMENT.as_bytes()).unwrap();
        assert_eq!(statement.format, FormatTag::Ibkr);
        assert_eq!(statement.records.len(), 4);
        assert_eq!(statement.warnings.len(), 1);

        let trade = &statement.records[0];
        assert_eq!(trade.transaction_type, TransactionType::Buy);
        assert_eq!(trade.date, at(2024, 1, 15, 10, 30, 0));
        assert_eq!(trade.quantity, Some(dec!(10)));
        assert_eq!(trade.amount, dec!(-1500));
        assert_eq!(trade.commission, dec!(1));
        let instrument = trade.instrument.as_ref().unwrap();
        assert_eq!(instrument.symbol.as_deref(), Some("AAPL"));
        assert_eq!(instrument.isin.as_deref(), Some("US0378331005"));
        assert_eq!(instrument.market_code.as_deref(), Some("NASDAQ"));
        assert_eq!(instrument.name, "APPLE INC");

        let dividend = &statement.records[1];
        assert_eq!(dividend.transaction_type, TransactionType::Dividend);
        assert_eq!(dividend.amount, dec!(2.4));

        let withholding = &statement.records[2];
        assert_eq!(withholding.amount, dec!(-0.36));
        assert_eq!(withholding.tax, dec!(0.36));

        let deposit = &statement.records[3];
        assert_eq!(deposit.transaction_type, TransactionType::Deposit);
        assert_eq!(deposit.amount, dec!(2000));

        assert_eq!(statement.holdings_hint.len(), 1);
        assert_eq!(statement.holdings_hint[0].quantity, dec!(10));
        assert_eq!(statement.holdings_hint[0].total_cost, Some(dec!(1501)));
    }

    #[test]
    fn ibkr_spanish_sections() {
        let statement = parse_bytes(IBKR_SPANISH.as_bytes()).unwrap();
        assert_eq!(statement.format, FormatTag::Ibkr);
        assert_eq!(statement.warnings.len(), 1);
        assert!(statement.warnings[0].message.contains("forex"));

        let kinds: Vec<(TransactionType, Decimal)> = statement
            .records
            .iter()
            .map(|record| (record.transaction_type, record.amount))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (TransactionType::Buy, dec!(-350)),
                (TransactionType::Sell, dec!(160)),
                (TransactionType::Dividend, dec!(5.7)),
                (TransactionType::Dividend, dec!(-1.08)),
                (TransactionType::Deposit, dec!(1000)),
                (TransactionType::Fee, dec!(-1.5)),
            ]
        );

        let buy = &statement.records[0];
        assert_eq!(buy.date, at(2024, 3, 1, 9, 5, 0));
        assert_eq!(buy.quantity, Some(dec!(100)));
        assert_eq!(buy.commission, dec!(2));
        let instrument = buy.instrument.as_ref().unwrap();
        assert_eq!(instrument.isin.as_deref(), Some("ES0113900J37"));
        assert_eq!(instrument.market_code.as_deref(), Some("BME"));
        assert_eq!(instrument.name, "BANCO SANTANDER SA");
        assert_eq!(instrument.asset_type, AssetType::Stock);

        let sell = &statement.records[1];
        assert_eq!(sell.quantity, Some(dec!(40)));

        let withholding = &statement.records[3];
        assert_eq!(withholding.tax, dec!(1.08));
        assert_eq!(
            withholding.instrument.as_ref().unwrap().isin.as_deref(),
            Some("ES0113900J37")
        );

        let deposit = &statement.records[4];
        assert_eq!(deposit.date, at(2024, 2, 28, 0, 0, 0));

        assert_eq!(statement.holdings_hint.len(), 1);
        let hint = &statement.holdings_hint[0];
        assert_eq!(hint.quantity, dec!(60));
        assert_eq!(hint.total_cost, Some(dec!(212.4)));
        assert_eq!(hint.basis, HintBasis::BrokerReported);
        assert_eq!(hint.instrument.isin.as_deref(), Some("ES0113900J37"));
    }

    #[test]
    fn revolut_x_crypto() {
        let statement = parse_bytes(REVOLUT_X.as_bytes()).unwrap();
        assert_eq!(statement.format, FormatTag::RevolutX);
        assert_eq!(statement.records.len(), 3);
        assert_eq!(statement.warnings.len(), 1);

        let buy = &statement.records[0];
        assert_eq!(buy.transaction_type, TransactionType::Buy);
        assert_eq!(buy.date, at(2024, 1, 5, 14, 2, 11));
        assert_eq!(buy.price, Some(dec!(40000)));
        assert_eq!(buy.amount, dec!(-400));
        assert_eq!(buy.commission, dec!(1));
        assert_eq!(buy.currency, "EUR");
        let instrument = buy.instrument.as_ref().unwrap();
        assert_eq!(instrument.isin.as_deref(), Some("CRYPTO:BTC"));
        assert_eq!(instrument.asset_type, AssetType::Crypto);

        let sell = &statement.records[1];
        assert_eq!(sell.transaction_type, TransactionType::Sell);
        assert_eq!(sell.amount, dec!(180));

        let reward = &statement.records[2];
        assert_eq!(reward.transaction_type, TransactionType::StakingReward);
        assert_eq!(reward.quantity, Some(dec!(0.1)));
        assert_eq!(reward.amount, Decimal::ZERO);

        let btc = statement
            .holdings_hint
            .iter()
            .find(|hint| hint.instrument.isin.as_deref() == Some("CRYPTO:BTC"))
            .unwrap();
        assert_eq!(btc.quantity, dec!(0.006));
    }

    #[test]
    fn revolut_x_rows_beyond_decimal_range() {
        let csv = "\
Symbol,Type,Quantity,Price,Value,Fees,Date
ETH,Buy,7922816251426433759354395,€100000.00,,,\"5 Ene 2024, 14:02:11\"
BTC,Buy,0.01,\"€40,000.00\",€400.00,€1.00,\"6 Ene 2024, 14:02:11\"
SOL,Staking reward,50000000000000000000000000000,,,,\"7 Ene 2024, 08:00:00\"
SOL,Staking reward,50000000000000000000000000000,,,,\"8 Ene 2024, 08:00:00\"
";
        let statement = parse_bytes(csv.as_bytes()).unwrap();

        assert_eq!(statement.records.len(), 3);
        assert_eq!(statement.warnings.len(), 1);
        assert_eq!(statement.warnings[0].line, 2);
        assert!(statement.warnings[0].message.contains("value"));

        // the SOL rewards are kept but their running total has no hint
        let hinted: Vec<&str> = statement
            .holdings_hint
            .iter()
            .filter_map(|hint| hint.instrument.symbol.as_deref())
            .collect();
        assert_eq!(hinted, vec!["BTC"]);
    }

    #[test]
    fn revolut_fiat_cash_flows() {
        let statement = parse_bytes(REVOLUT_FIAT.as_bytes()).unwrap();
        assert_eq!(statement.format, FormatTag::RevolutFiat);

        let flows: Vec<(TransactionType, Decimal)> = statement
            .records
            .iter()
            .map(|record| (record.transaction_type, record.amount))
            .collect();
        assert_eq!(
            flows,
            vec![
                (TransactionType::Deposit, dec!(500)),
                (TransactionType::Withdrawal, dec!(-100)),
                (TransactionType::Deposit, dec!(50)),
                (TransactionType::Fee, dec!(-2.99)),
                (TransactionType::Dividend, dec!(0.5)),
                (TransactionType::Withdrawal, dec!(-50)),
            ]
        );
        assert_eq!(statement.records[5].fees, dec!(1));
        assert!(statement.records.iter().all(|record| record.instrument.is_none()));

        // WEIRD row plus the summary of ignored spending rows
        assert_eq!(statement.warnings.len(), 2);
    }

    #[test]
    fn unknown_format_is_reported_not_guessed() {
        let error = parse_bytes(b"foo,bar\n1,2\n").unwrap_err();
        assert!(matches!(error, ParseError::FormatDetection(_)));
    }

    #[test]
    fn decoding() {
        assert_eq!(decode(b"\xef\xbb\xbfabc").unwrap(), "abc");
        assert_eq!(decode(b"Fecha,N\xfamero").unwrap(), "Fecha,Número");
        assert_eq!(decode(b"\xff\xfea\x00b\x00").unwrap(), "ab");
        assert!(matches!(decode(b"a\x00b"), Err(ParseError::Encoding(_))));
    }

    #[test]
    fn latin1_degiro_export_parses() {
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(DEGIRO_TRANSACTIONS);
        let statement = parse_bytes(&bytes).unwrap();
        assert_eq!(statement.records.len(), 3);
    }
}
