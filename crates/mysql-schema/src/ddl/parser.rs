//! Recursive-descent parser over the token stream.

use super::lexer::{tokenize, Tok, Token};
use super::{AlterSpec, ColumnDef, ColumnPosition, DdlStatement, ObjectName};
use crate::error::DdlError;
use crate::table::ColumnType;

pub(super) fn parse_statement(sql: &str) -> Result<DdlStatement, DdlError> {
    let mut toks = tokenize(sql)?;
    while matches!(toks.last().map(|t| &t.tok), Some(Tok::Semi)) {
        toks.pop();
    }
    let mut p = Parser { sql, toks, pos: 0 };

    let first = p
        .peek()
        .and_then(|t| t.ident().map(|s| s.to_ascii_uppercase()))
        .unwrap_or_default();
    match first.as_str() {
        "CREATE" => p.parse_create(),
        "ALTER" => p.parse_alter(),
        "RENAME" => p.parse_rename(),
        "DROP" => p.parse_drop(),
        "TRUNCATE" => p.parse_truncate(),
        other => Err(DdlError::UnsupportedStatement {
            keyword: other.to_string(),
            sql: sql.to_string(),
        }),
    }
}

struct Parser<'a> {
    sql: &'a str,
    toks: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.toks.get(self.pos + n)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn at_word(&self, kw: &str) -> bool {
        self.peek().map(|t| t.is_word(kw)).unwrap_or(false)
    }

    fn eat_word(&mut self, kw: &str) -> bool {
        if self.at_word(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek().map(|t| &t.tok == tok).unwrap_or(false) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok) -> Result<(), DdlError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.err(format!("expected {tok:?}")))
        }
    }

    fn expect_word(&mut self, kw: &str) -> Result<(), DdlError> {
        if self.eat_word(kw) {
            Ok(())
        } else {
            Err(self.err(format!("expected {kw}")))
        }
    }

    fn expect_ident(&mut self) -> Result<String, DdlError> {
        match self.next() {
            Some(t) => t
                .ident()
                .map(str::to_string)
                .ok_or_else(|| self.err("expected identifier".to_string())),
            None => Err(self.err("expected identifier, found end of statement".to_string())),
        }
    }

    fn err(&self, message: String) -> DdlError {
        let pos = self
            .peek()
            .map(|t| t.start)
            .unwrap_or(self.sql.len());
        DdlError::ParseError {
            pos,
            message,
            sql: self.sql.to_string(),
        }
    }

    /// Source text from token `from` through the last consumed token.
    fn slice_from(&self, from: usize) -> &'a str {
        if from >= self.pos || from >= self.toks.len() {
            return "";
        }
        let start = self.toks[from].start;
        let end = self.toks[self.pos - 1].end;
        self.sql[start..end].trim()
    }

    fn parse_object_name(&mut self) -> Result<ObjectName, DdlError> {
        let first = self.expect_ident()?;
        if self.eat(&Tok::Dot) {
            let name = self.expect_ident()?;
            Ok(ObjectName {
                schema: Some(first),
                name,
            })
        } else {
            Ok(ObjectName {
                schema: None,
                name: first,
            })
        }
    }

    /// Consume tokens up to (not including) a depth-0 comma or closing paren.
    fn skip_clause(&mut self) {
        let mut depth = 0usize;
        while let Some(t) = self.peek() {
            match &t.tok {
                Tok::LParen => depth += 1,
                Tok::RParen => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                Tok::Comma if depth == 0 => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn skip_parens(&mut self) -> Result<(), DdlError> {
        self.expect(Tok::LParen)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.next().map(|t| t.tok) {
                Some(Tok::LParen) => depth += 1,
                Some(Tok::RParen) => depth -= 1,
                Some(_) => {}
                None => return Err(self.err("unbalanced parentheses".to_string())),
            }
        }
        Ok(())
    }

    // CREATE [TEMPORARY] TABLE [IF NOT EXISTS] name
    //   ( defs... ) [options] | LIKE name | ( LIKE name ) | [AS] SELECT ...
    fn parse_create(&mut self) -> Result<DdlStatement, DdlError> {
        self.expect_word("CREATE")?;
        self.eat_word("TEMPORARY");
        if !self.eat_word("TABLE") {
            let kw = self
                .peek()
                .and_then(|t| t.ident())
                .map(|s| format!("CREATE {}", s.to_ascii_uppercase()))
                .unwrap_or_else(|| "CREATE".to_string());
            return Err(DdlError::UnsupportedStatement {
                keyword: kw,
                sql: self.sql.to_string(),
            });
        }
        let if_not_exists = if self.eat_word("IF") {
            self.expect_word("NOT")?;
            self.expect_word("EXISTS")?;
            true
        } else {
            false
        };
        let table = self.parse_object_name()?;

        if self.eat_word("LIKE") {
            let like = self.parse_object_name()?;
            return Ok(DdlStatement::CreateTable {
                table,
                if_not_exists,
                columns: Vec::new(),
                comment: String::new(),
                like: Some(like),
                as_select: false,
            });
        }
        if self.at_word("AS") || self.at_word("SELECT") {
            return Ok(DdlStatement::CreateTable {
                table,
                if_not_exists,
                columns: Vec::new(),
                comment: String::new(),
                like: None,
                as_select: true,
            });
        }

        self.expect(Tok::LParen)?;
        if self.eat_word("LIKE") {
            let like = self.parse_object_name()?;
            self.expect(Tok::RParen)?;
            return Ok(DdlStatement::CreateTable {
                table,
                if_not_exists,
                columns: Vec::new(),
                comment: String::new(),
                like: Some(like),
                as_select: false,
            });
        }

        let mut columns: Vec<ColumnDef> = Vec::new();
        let mut pk_names: Vec<String> = Vec::new();
        loop {
            if self.is_table_constraint() {
                if let Some(names) = self.parse_table_constraint()? {
                    pk_names = names;
                }
            } else {
                let (def, _) = self.parse_column_def(false)?;
                columns.push(def);
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen)?;

        for name in &pk_names {
            if let Some(col) = columns.iter_mut().find(|c| &c.name == name) {
                col.primary_key = true;
            }
        }

        let mut comment = String::new();
        let mut as_select = false;
        while let Some(t) = self.peek() {
            if t.is_word("COMMENT") {
                self.pos += 1;
                self.eat(&Tok::Op('='));
                if let Some(Token { tok: Tok::Str(s), .. }) = self.next() {
                    comment = s;
                }
            } else if t.is_word("AS") || t.is_word("SELECT") {
                as_select = true;
                break;
            } else if matches!(t.tok, Tok::LParen) {
                self.skip_parens()?;
            } else {
                self.pos += 1;
            }
        }

        Ok(DdlStatement::CreateTable {
            table,
            if_not_exists,
            columns,
            comment,
            like: None,
            as_select,
        })
    }

    fn is_table_constraint(&self) -> bool {
        const STARTERS: [&str; 9] = [
            "PRIMARY",
            "UNIQUE",
            "KEY",
            "INDEX",
            "CONSTRAINT",
            "FOREIGN",
            "FULLTEXT",
            "SPATIAL",
            "CHECK",
        ];
        match self.peek() {
            Some(t) => STARTERS.iter().any(|kw| t.is_word(kw)),
            None => false,
        }
    }

    /// Returns the primary-key column names when the constraint is a
    /// PRIMARY KEY, otherwise consumes and discards the clause.
    fn parse_table_constraint(&mut self) -> Result<Option<Vec<String>>, DdlError> {
        if self.eat_word("CONSTRAINT") {
            // optional symbol name
            if self.peek().map(|t| t.ident().is_some()).unwrap_or(false)
                && !self.at_word("PRIMARY")
                && !self.at_word("FOREIGN")
                && !self.at_word("UNIQUE")
                && !self.at_word("CHECK")
            {
                self.pos += 1;
            }
        }
        if self.eat_word("PRIMARY") {
            self.expect_word("KEY")?;
            // optional index type, e.g. USING BTREE
            if self.eat_word("USING") {
                self.pos += 1;
            }
            let names = self.parse_key_part_names()?;
            self.skip_clause();
            return Ok(Some(names));
        }
        self.skip_clause();
        Ok(None)
    }

    /// `(col [(len)] [ASC|DESC], ...)` inside a key definition.
    fn parse_key_part_names(&mut self) -> Result<Vec<String>, DdlError> {
        self.expect(Tok::LParen)?;
        let mut names = Vec::new();
        loop {
            names.push(self.expect_ident()?);
            if self.peek().map(|t| t.tok == Tok::LParen).unwrap_or(false) {
                self.skip_parens()?;
            }
            self.eat_word("ASC");
            self.eat_word("DESC");
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen)?;
        Ok(names)
    }

    /// `name type [options...] [FIRST | AFTER col]`.
    fn parse_column_def(
        &mut self,
        allow_position: bool,
    ) -> Result<(ColumnDef, ColumnPosition), DdlError> {
        let name = self.expect_ident()?;

        let type_start = self.pos;
        let type_word = self.expect_ident()?.to_ascii_lowercase();
        if type_word == "double" {
            self.eat_word("PRECISION");
        }
        if self.peek().map(|t| t.tok == Tok::LParen).unwrap_or(false) {
            self.skip_parens()?;
        }
        while self.eat_word("UNSIGNED") || self.eat_word("SIGNED") || self.eat_word("ZEROFILL") {}
        let raw_type = self.slice_from(type_start).to_string();
        let col_type = ColumnType::from_raw(&raw_type);

        let mut comment = String::new();
        let mut primary_key = false;
        let mut position = ColumnPosition::None;
        let opts_start = self.pos;
        let mut opts_end = self.pos;

        loop {
            let Some(t) = self.peek() else { break };
            match &t.tok {
                Tok::Comma | Tok::RParen => break,
                Tok::LParen => {
                    self.skip_parens()?;
                    opts_end = self.pos;
                }
                Tok::Word(w) if allow_position && w.eq_ignore_ascii_case("FIRST") => {
                    self.pos += 1;
                    position = ColumnPosition::First;
                    break;
                }
                Tok::Word(w) if allow_position && w.eq_ignore_ascii_case("AFTER") => {
                    self.pos += 1;
                    let rel = self.expect_ident()?;
                    position = ColumnPosition::After(rel);
                    break;
                }
                Tok::Word(w) if w.eq_ignore_ascii_case("COMMENT") => {
                    self.pos += 1;
                    self.eat(&Tok::Op('='));
                    match self.next() {
                        Some(Token { tok: Tok::Str(s), .. }) => comment = s,
                        _ => return Err(self.err("expected string after COMMENT".to_string())),
                    }
                    opts_end = self.pos;
                }
                Tok::Word(w) if w.eq_ignore_ascii_case("PRIMARY") => {
                    self.pos += 1;
                    self.eat_word("KEY");
                    primary_key = true;
                    opts_end = self.pos;
                }
                _ => {
                    self.pos += 1;
                    opts_end = self.pos;
                }
            }
        }

        let options_sql = if opts_end > opts_start {
            let start = self.toks[opts_start].start;
            let end = self.toks[opts_end - 1].end;
            self.sql[start..end].trim().to_string()
        } else {
            String::new()
        };

        Ok((
            ColumnDef {
                name,
                raw_type,
                col_type,
                comment,
                primary_key,
                options_sql,
            },
            position,
        ))
    }

    // ALTER [IGNORE] TABLE name spec [, spec ...]
    fn parse_alter(&mut self) -> Result<DdlStatement, DdlError> {
        self.expect_word("ALTER")?;
        self.eat_word("IGNORE");
        if !self.eat_word("TABLE") {
            let kw = self
                .peek()
                .and_then(|t| t.ident())
                .map(|s| format!("ALTER {}", s.to_ascii_uppercase()))
                .unwrap_or_else(|| "ALTER".to_string());
            return Err(DdlError::UnsupportedStatement {
                keyword: kw,
                sql: self.sql.to_string(),
            });
        }
        let table = self.parse_object_name()?;

        let body_start = self.pos;
        let mut specs = Vec::new();
        if self.peek().is_some() {
            loop {
                let mut batch = self.parse_alter_spec()?;
                specs.append(&mut batch);
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
        }
        let body = self.slice_from(body_start).to_string();

        Ok(DdlStatement::AlterTable { table, specs, body })
    }

    /// One ALTER clause. `ADD COLUMN (a int, b int)` expands to several
    /// specs, hence the Vec.
    fn parse_alter_spec(&mut self) -> Result<Vec<AlterSpec>, DdlError> {
        if self.eat_word("ADD") {
            let had_column_kw = self.eat_word("COLUMN");
            if !had_column_kw && self.is_index_like() {
                self.skip_clause();
                return Ok(vec![AlterSpec::Ignored]);
            }
            if self.peek().map(|t| t.tok == Tok::LParen).unwrap_or(false) {
                self.pos += 1;
                let mut out = Vec::new();
                loop {
                    let (def, _) = self.parse_column_def(false)?;
                    out.push(AlterSpec::AddColumn {
                        def,
                        position: ColumnPosition::None,
                    });
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                self.expect(Tok::RParen)?;
                return Ok(out);
            }
            let (def, position) = self.parse_column_def(true)?;
            return Ok(vec![AlterSpec::AddColumn { def, position }]);
        }

        if self.eat_word("DROP") {
            let had_column_kw = self.eat_word("COLUMN");
            if !had_column_kw {
                const NON_COLUMN: [&str; 8] = [
                    "INDEX",
                    "KEY",
                    "PRIMARY",
                    "FOREIGN",
                    "CONSTRAINT",
                    "PARTITION",
                    "CHECK",
                    "DEFAULT",
                ];
                if self
                    .peek()
                    .map(|t| NON_COLUMN.iter().any(|kw| t.is_word(kw)))
                    .unwrap_or(false)
                {
                    self.skip_clause();
                    return Ok(vec![AlterSpec::Ignored]);
                }
            }
            let name = self.expect_ident()?;
            return Ok(vec![AlterSpec::DropColumn { name }]);
        }

        if self.eat_word("MODIFY") {
            self.eat_word("COLUMN");
            let (def, position) = self.parse_column_def(true)?;
            return Ok(vec![AlterSpec::ModifyColumn { def, position }]);
        }

        if self.eat_word("CHANGE") {
            self.eat_word("COLUMN");
            let old_name = self.expect_ident()?;
            let (def, position) = self.parse_column_def(true)?;
            return Ok(vec![AlterSpec::ChangeColumn {
                old_name,
                def,
                position,
            }]);
        }

        if self.eat_word("RENAME") {
            if self.eat_word("COLUMN") {
                let old_name = self.expect_ident()?;
                self.expect_word("TO")?;
                let new_name = self.expect_ident()?;
                return Ok(vec![AlterSpec::RenameColumn { old_name, new_name }]);
            }
            if self.at_word("INDEX") || self.at_word("KEY") {
                self.skip_clause();
                return Ok(vec![AlterSpec::Ignored]);
            }
            if !self.eat_word("TO") {
                self.eat_word("AS");
            }
            let to = self.parse_object_name()?;
            return Ok(vec![AlterSpec::RenameTable { to }]);
        }

        // engine/charset/comment/partition/algorithm/lock/... clauses
        self.skip_clause();
        Ok(vec![AlterSpec::Ignored])
    }

    fn is_index_like(&self) -> bool {
        const KINDS: [&str; 8] = [
            "INDEX",
            "KEY",
            "CONSTRAINT",
            "UNIQUE",
            "FULLTEXT",
            "SPATIAL",
            "PRIMARY",
            "FOREIGN",
        ];
        match self.peek() {
            Some(t) => KINDS.iter().any(|kw| t.is_word(kw)),
            None => false,
        }
    }

    // RENAME TABLE a TO b [, c TO d ...]
    fn parse_rename(&mut self) -> Result<DdlStatement, DdlError> {
        self.expect_word("RENAME")?;
        if !self.eat_word("TABLE") {
            return Err(DdlError::UnsupportedStatement {
                keyword: "RENAME".to_string(),
                sql: self.sql.to_string(),
            });
        }
        let mut pairs = Vec::new();
        loop {
            let from = self.parse_object_name()?;
            self.expect_word("TO")?;
            let to = self.parse_object_name()?;
            pairs.push((from, to));
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        Ok(DdlStatement::RenameTable { pairs })
    }

    // DROP [TEMPORARY] TABLE [IF EXISTS] name [, name ...]
    fn parse_drop(&mut self) -> Result<DdlStatement, DdlError> {
        self.expect_word("DROP")?;
        self.eat_word("TEMPORARY");
        if !self.eat_word("TABLE") {
            let kw = self
                .peek()
                .and_then(|t| t.ident())
                .map(|s| format!("DROP {}", s.to_ascii_uppercase()))
                .unwrap_or_else(|| "DROP".to_string());
            return Err(DdlError::UnsupportedStatement {
                keyword: kw,
                sql: self.sql.to_string(),
            });
        }
        let if_exists = if self.eat_word("IF") {
            self.expect_word("EXISTS")?;
            true
        } else {
            false
        };
        let mut tables = Vec::new();
        loop {
            tables.push(self.parse_object_name()?);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        Ok(DdlStatement::DropTable { tables, if_exists })
    }

    // TRUNCATE [TABLE] name
    fn parse_truncate(&mut self) -> Result<DdlStatement, DdlError> {
        self.expect_word("TRUNCATE")?;
        self.eat_word("TABLE");
        let table = self.parse_object_name()?;
        Ok(DdlStatement::TruncateTable { table })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> DdlStatement {
        parse_statement(sql).unwrap()
    }

    #[test]
    fn test_create_full_definition() {
        let stmt = parse(
            "CREATE TABLE `shop`.`orders` (\
               `id` bigint unsigned NOT NULL AUTO_INCREMENT COMMENT 'order id',\
               `sku` varchar(64) NOT NULL DEFAULT '',\
               `amount` decimal(10,2) DEFAULT NULL,\
               `created` datetime(6) DEFAULT CURRENT_TIMESTAMP(6),\
               PRIMARY KEY (`id`),\
               KEY `idx_sku` (`sku`(10))\
             ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COMMENT='order facts'",
        );
        match stmt {
            DdlStatement::CreateTable {
                table,
                columns,
                comment,
                like,
                as_select,
                ..
            } => {
                assert_eq!(table.schema.as_deref(), Some("shop"));
                assert_eq!(table.name, "orders");
                assert_eq!(comment, "order facts");
                assert!(like.is_none());
                assert!(!as_select);
                assert_eq!(columns.len(), 4);
                assert!(columns[0].primary_key);
                assert_eq!(columns[0].comment, "order id");
                assert_eq!(columns[0].raw_type, "bigint unsigned");
                assert_eq!(columns[0].col_type, ColumnType::Number);
                assert_eq!(columns[1].raw_type, "varchar(64)");
                assert_eq!(columns[2].col_type, ColumnType::Decimal);
                assert_eq!(columns[3].col_type, ColumnType::Datetime);
                assert!(!columns[1].primary_key);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_create_like() {
        let stmt = parse("CREATE TABLE _orders_gho LIKE orders");
        match stmt {
            DdlStatement::CreateTable { table, like, .. } => {
                assert_eq!(table.name, "_orders_gho");
                assert_eq!(like.unwrap().name, "orders");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_create_as_select_flagged() {
        let stmt = parse("CREATE TABLE copy AS SELECT * FROM orders");
        match stmt {
            DdlStatement::CreateTable { as_select, columns, .. } => {
                assert!(as_select);
                assert!(columns.is_empty());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_alter_add_with_position() {
        let stmt = parse("ALTER TABLE t ADD COLUMN c int NOT NULL DEFAULT 0 AFTER b");
        match stmt {
            DdlStatement::AlterTable { specs, body, .. } => {
                assert_eq!(specs.len(), 1);
                match &specs[0] {
                    AlterSpec::AddColumn { def, position } => {
                        assert_eq!(def.name, "c");
                        assert_eq!(def.options_sql, "NOT NULL DEFAULT 0");
                        assert_eq!(*position, ColumnPosition::After("b".to_string()));
                    }
                    other => panic!("unexpected: {other:?}"),
                }
                assert_eq!(body, "ADD COLUMN c int NOT NULL DEFAULT 0 AFTER b");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_alter_multi_column_add() {
        let stmt = parse("ALTER TABLE t ADD COLUMN (a int, b varchar(4))");
        match stmt {
            DdlStatement::AlterTable { specs, .. } => {
                assert_eq!(specs.len(), 2);
                assert!(matches!(&specs[0], AlterSpec::AddColumn { def, .. } if def.name == "a"));
                assert!(matches!(&specs[1], AlterSpec::AddColumn { def, .. } if def.name == "b"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_alter_change_and_rename_column() {
        let stmt = parse("ALTER TABLE t CHANGE old_c new_c varchar(8) FIRST, RENAME COLUMN x TO y");
        match stmt {
            DdlStatement::AlterTable { specs, .. } => {
                assert_eq!(specs.len(), 2);
                match &specs[0] {
                    AlterSpec::ChangeColumn { old_name, def, position } => {
                        assert_eq!(old_name, "old_c");
                        assert_eq!(def.name, "new_c");
                        assert_eq!(*position, ColumnPosition::First);
                    }
                    other => panic!("unexpected: {other:?}"),
                }
                assert_eq!(
                    specs[1],
                    AlterSpec::RenameColumn {
                        old_name: "x".to_string(),
                        new_name: "y".to_string()
                    }
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_alter_index_and_option_clauses_ignored() {
        let stmt = parse(
            "ALTER TABLE t ADD INDEX idx_a (a), DROP KEY idx_b, ENGINE=InnoDB, \
             DROP COLUMN gone, ALGORITHM=INPLACE",
        );
        match stmt {
            DdlStatement::AlterTable { specs, .. } => {
                assert_eq!(specs.len(), 5);
                assert_eq!(specs[0], AlterSpec::Ignored);
                assert_eq!(specs[1], AlterSpec::Ignored);
                assert_eq!(specs[2], AlterSpec::Ignored);
                assert_eq!(specs[3], AlterSpec::DropColumn { name: "gone".to_string() });
                assert_eq!(specs[4], AlterSpec::Ignored);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_alter_rename_to_table() {
        let stmt = parse("ALTER TABLE t RENAME TO t_new");
        match stmt {
            DdlStatement::AlterTable { specs, .. } => {
                assert!(matches!(&specs[0], AlterSpec::RenameTable { to } if to.name == "t_new"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_rename_swap_pairs() {
        let stmt = parse("RENAME TABLE orders TO _orders_del, _orders_gho TO orders");
        match stmt {
            DdlStatement::RenameTable { pairs } => {
                assert_eq!(pairs.len(), 2);
                assert_eq!(pairs[0].0.name, "orders");
                assert_eq!(pairs[1].1.name, "orders");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_reports_position() {
        let err = parse_statement("ALTER TABLE t CHANGE").unwrap_err();
        match err {
            DdlError::ParseError { pos, .. } => assert_eq!(pos, 20),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
