use anyhow::Result;
use sqlx::PgPool;

pub async fn run_postgres_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running PostgreSQL migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quotation_processes (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name VARCHAR NOT NULL,
            base_currency VARCHAR(3) NOT NULL DEFAULT 'PEN',
            exchange_rate DOUBLE PRECISION,
            target_margin_pct DOUBLE PRECISION,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS baseline_items (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            process_id UUID NOT NULL REFERENCES quotation_processes(id) ON DELETE CASCADE,
            sheet_name VARCHAR NOT NULL,
            section_path TEXT[] NOT NULL DEFAULT '{}',
            item_code VARCHAR,
            description TEXT NOT NULL,
            unit VARCHAR,
            quantity DOUBLE PRECISION,
            unit_price DOUBLE PRECISION,
            total_price DOUBLE PRECISION,
            reference_quotes JSONB NOT NULL DEFAULT '[]',
            row_number INTEGER NOT NULL,
            import_position INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quotations (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            process_id UUID NOT NULL REFERENCES quotation_processes(id) ON DELETE CASCADE,
            supplier_name VARCHAR NOT NULL,
            supplier_tax_id VARCHAR,
            currency VARCHAR(3) NOT NULL,
            exchange_rate DOUBLE PRECISION,
            total_amount DOUBLE PRECISION NOT NULL DEFAULT 0,
            total_amount_pen DOUBLE PRECISION NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS quotation_items (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            quotation_id UUID NOT NULL REFERENCES quotations(id) ON DELETE CASCADE,
            baseline_item_id UUID REFERENCES baseline_items(id) ON DELETE SET NULL,
            material_id UUID,
            item_code VARCHAR,
            description TEXT NOT NULL,
            offered_description TEXT,
            brand VARCHAR,
            unit VARCHAR,
            normalized_unit VARCHAR,
            unit_converted BOOLEAN NOT NULL DEFAULT FALSE,
            quantity DOUBLE PRECISION,
            unit_price DOUBLE PRECISION,
            total_price DOUBLE PRECISION,
            currency VARCHAR(3) NOT NULL,
            normalized_price DOUBLE PRECISION,
            match_score DOUBLE PRECISION NOT NULL DEFAULT 0,
            source_sheet VARCHAR,
            source_row INTEGER,
            is_manual BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS purchase_order_lines (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            process_id UUID NOT NULL REFERENCES quotation_processes(id) ON DELETE CASCADE,
            baseline_item_id UUID REFERENCES baseline_items(id) ON DELETE SET NULL,
            quotation_item_id UUID REFERENCES quotation_items(id) ON DELETE SET NULL,
            description TEXT NOT NULL,
            unit VARCHAR,
            quantity DOUBLE PRECISION NOT NULL,
            unit_price DOUBLE PRECISION,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS purchase_delivery_items (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            process_id UUID NOT NULL REFERENCES quotation_processes(id) ON DELETE CASCADE,
            order_line_id UUID REFERENCES purchase_order_lines(id) ON DELETE SET NULL,
            baseline_item_id UUID REFERENCES baseline_items(id) ON DELETE SET NULL,
            description TEXT NOT NULL,
            unit VARCHAR,
            quantity DOUBLE PRECISION NOT NULL,
            received_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("ALTER TABLE baseline_items ADD COLUMN IF NOT EXISTS import_position INTEGER NOT NULL DEFAULT 0")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_baseline_items_process_position ON baseline_items(process_id, import_position)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_quotations_process_id ON quotations(process_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_quotation_items_quotation_id ON quotation_items(quotation_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_quotation_items_baseline_item_id ON quotation_items(baseline_item_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_purchase_order_lines_process_id ON purchase_order_lines(process_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_purchase_delivery_items_process_id ON purchase_delivery_items(process_id)")
        .execute(pool)
        .await?;

    tracing::info!("PostgreSQL migrations completed successfully");
    Ok(())
}
