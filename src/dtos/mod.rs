pub mod gamificationdtos;
