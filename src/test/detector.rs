#[cfg(test)]
mod tests {
    use crate::{models::FormatTag, parsers::detect_format};

    #[test]
    fn ibkr_by_statement_marker() {
        let text = "Statement,Header,Field Name,Field Value\nStatement,Data,BrokerName,Interactive Brokers\n";
        assert_eq!(detect_format(text), FormatTag::Ibkr);
    }

    #[test]
    fn ibkr_spanish_account_section() {
        let text = "Extracto,Header,Nombre del campo,Valor del campo\nInformación sobre la cuenta,Header,Nombre del campo,Valor del campo\n";
        assert_eq!(detect_format(text), FormatTag::Ibkr);
    }

    #[test]
    fn degiro_regardless_of_column_order_and_bom() {
        let text = "\u{feff}ISIN,Producto,Hora,Fecha,Bolsa de\n";
        assert_eq!(detect_format(text), FormatTag::Degiro);

        let english = "Date,Time,Product,ISIN,Reference exchange,Venue,Quantity\n";
        assert_eq!(detect_format(english), FormatTag::Degiro);
    }

    #[test]
    fn semicolon_header_is_still_recognised() {
        let text = "Fecha;Hora;Producto;ISIN;Bolsa de\n";
        assert_eq!(detect_format(text), FormatTag::Degiro);
    }

    #[test]
    fn revolut_variants() {
        let crypto = "Symbol,Type,Quantity,Price,Value,Fees,Date\n";
        assert_eq!(detect_format(crypto), FormatTag::RevolutX);

        let fiat = "Type,Product,Started Date,Completed Date,Description,Amount,Fee,Currency,State,Balance\n";
        assert_eq!(detect_format(fiat), FormatTag::RevolutFiat);
    }

    #[test]
    fn never_guesses() {
        assert_eq!(detect_format("foo,bar,baz\n1,2,3\n"), FormatTag::Unknown);
        assert_eq!(detect_format(""), FormatTag::Unknown);
        assert_eq!(detect_format("Symbol,Type,Quantity\n"), FormatTag::Unknown);
    }
}
