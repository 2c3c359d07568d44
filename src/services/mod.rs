/*
 * Responsibility
 * - ドメインサービス (auth pipeline, one-time token cache, mail delivery)
 * - HTTP の詳細は持たない (middleware / handlers 側で変換)
 */
pub mod auth;
pub mod cache;
pub mod mail;
