//! Table definitions, applied on every connect.

/// DDL statements in dependency order. Every statement is idempotent.
pub(crate) const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT NOT NULL,
        first_name TEXT NOT NULL DEFAULT '',
        last_name TEXT NOT NULL DEFAULT '',
        phone TEXT,
        is_staff INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS auth_tokens (
        token_hash TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        kind TEXT NOT NULL,
        expires_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS colors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS sizes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS brands (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS collections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        image TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL,
        price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
        reviews INTEGER NOT NULL DEFAULT 0,
        is_sales INTEGER NOT NULL DEFAULT 0,
        rating REAL,
        code TEXT UNIQUE,
        available INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS product_colors (
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        attribute_id INTEGER NOT NULL REFERENCES colors(id) ON DELETE CASCADE,
        PRIMARY KEY (product_id, attribute_id)
    )",
    "CREATE TABLE IF NOT EXISTS product_sizes (
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        attribute_id INTEGER NOT NULL REFERENCES sizes(id) ON DELETE CASCADE,
        PRIMARY KEY (product_id, attribute_id)
    )",
    "CREATE TABLE IF NOT EXISTS product_brands (
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        attribute_id INTEGER NOT NULL REFERENCES brands(id) ON DELETE CASCADE,
        PRIMARY KEY (product_id, attribute_id)
    )",
    "CREATE TABLE IF NOT EXISTS product_categories (
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        attribute_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
        PRIMARY KEY (product_id, attribute_id)
    )",
    "CREATE TABLE IF NOT EXISTS product_collections (
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
        PRIMARY KEY (product_id, collection_id)
    )",
    "CREATE TABLE IF NOT EXISTS product_images (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        image TEXT NOT NULL,
        is_main INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        text TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS carts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        session_key TEXT UNIQUE,
        created_at TEXT NOT NULL,
        CHECK ((user_id IS NULL) <> (session_key IS NULL))
    )",
    "CREATE TABLE IF NOT EXISTS cart_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cart_id INTEGER NOT NULL REFERENCES carts(id) ON DELETE CASCADE,
        product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
        quantity INTEGER NOT NULL CHECK (quantity >= 1),
        UNIQUE (cart_id, product_id)
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        session_key TEXT,
        first_name TEXT,
        last_name TEXT,
        email TEXT,
        phone TEXT,
        delivery_cost_cents INTEGER NOT NULL DEFAULT 0,
        total_price_cents INTEGER NOT NULL DEFAULT 0,
        payment_method TEXT,
        delivery_method TEXT,
        delivery_city TEXT,
        delivery_address TEXT,
        delivery_postal_code TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS orders_user_idx ON orders(user_id)",
    "CREATE INDEX IF NOT EXISTS orders_session_idx ON orders(session_key)",
    "CREATE TABLE IF NOT EXISTS order_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        product_id INTEGER NOT NULL REFERENCES products(id),
        quantity INTEGER NOT NULL CHECK (quantity >= 1),
        price_cents INTEGER NOT NULL
    )",
];
