mod dampers;
mod scheduling;
mod transient;
