pub mod index_actor;
